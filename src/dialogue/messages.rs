//! User-facing texts of the dialogue.

use crate::channels::{LinkButton, OutgoingMessage};

pub const DEVELOPER: &str = "💬 Разработчик: Титов Антон";
pub const DEVELOPER_GITHUB: &str = "https://github.com/bayanist";
pub const DEVELOPER_TELEGRAM: &str = "https://t.me/bayanman";

pub const WELCOME: &str = "👋 Здравствуйте! Я помогу составить индивидуальный план работы.\n\
                           Для начала, пожалуйста, введите Ф.И.О. ребёнка:";
pub const ASK_BIRTHDATE: &str = "Введите дату рождения (дд.мм.гггг):";
pub const ASK_GOAL: &str = "Введите цель работы:\n\
                            Например: Повышение оценки через создание позитивного 'Я' образа";

pub const REGENERATING: &str = "🔄 Пересоздаю план с сохраненными данными...";
pub const NO_SAVED_DATA: &str =
    "❌ Нет сохраненных данных. Пожалуйста, начните сначала с помощью команды /start";
pub const CANCELLED: &str = "❌ Операция отменена. Для начала нового плана используйте /start";

pub const GENERATION_FAILED: &str = "❌ Не удалось сгенерировать план. Попробуйте позже или используйте /start для нового запроса.";
pub const CREATING_DOCUMENT: &str = "📝 Создаём документ...";
pub const SENDING_FILE: &str = "📤 Отправляю файл...";
pub const DONE: &str =
    "✅ Готово! Можете начать новый план командой /start\n🔄 Пересоздать план /reset";

/// Attribution shown on `/start`, with profile buttons.
pub fn developer() -> OutgoingMessage {
    OutgoingMessage::text(DEVELOPER).with_links(vec![
        LinkButton::new("🛠️ GitHub", DEVELOPER_GITHUB),
        LinkButton::new("💬 Telegram", DEVELOPER_TELEGRAM),
    ])
}

/// Report for an unexpected failure after generation succeeded.
pub fn unexpected_error(detail: &str) -> String {
    format!("❌ Произошла ошибка: {detail}\nПопробуйте начать сначала с помощью команды /start")
}
