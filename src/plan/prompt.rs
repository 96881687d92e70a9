//! Prompt text sent to the generation endpoint.

/// Fixed payload of the connectivity probe. Never the real prompt.
pub const PROBE_PROMPT: &str = "test connection";

/// Build the generation prompt for a work goal.
///
/// The goal is embedded verbatim. The prompt asks for three pipe-separated
/// columns and shows `---` separator lines, which the parser later drops.
pub fn build_prompt(goal: &str) -> String {
    format!(
        "\
На основе цели '{goal}', составь таблицу с тремя колонками:
1. Направление (какие аспекты работы подходят под эту цель).
2. Коррекционные задачи (что именно корректируем/развиваем).
3. Темы занятий (конкретные темы, соответствующие задачам).

Пример формата ответа:
---
Коррекция и развитие эмоционально-волевой сферы | Развитие самоконтроля, снижение тревожности | Как справляться со стрессом?, Что такое сила воли?
---
Ответ дай только в таком формате, без заголовков.
"
    )
}
