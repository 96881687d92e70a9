//! Plan document: header block plus a six-column table.
//!
//! `PlanDocument` is the format-neutral model. `docx` packages it as a Word
//! file, and `write_transient` puts that file on disk for delivery.

pub mod docx;

use std::path::{Path, PathBuf};

use crate::error::RenderError;
use crate::plan::PlanRow;
use crate::session::CompletedSession;

pub const INSTITUTION: &str = "ГБОУ «Реабилитационная школа-интернат «Восхождение»»";
pub const TITLE: &str = "Индивидуальный план работы педагога-психолога";
pub const TEACHER_LINE: &str = "Тевфиковой Анны Николаевны на 2024-2025 учебный год";
pub const CLASS_PLACEHOLDER: &str = "[укажите класс]";

/// Column headers of the plan table.
pub const TABLE_HEADERS: [&str; 6] = [
    "Направление",
    "Коррекционные задачи",
    "Темы",
    "Кол-во занятий",
    "Динамика (январь)",
    "Динамика (май)",
];

/// Value of the cells left for manual follow-up.
pub const PLACEHOLDER_BLANK: &str = " ";

const FILE_PREFIX: &str = "Индивидуальный_план_";
const FILE_EXTENSION: &str = ".docx";
const TRANSIENT_FILE_NAME: &str = "plan.docx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
}

/// A single-run paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub alignment: Alignment,
    pub bold: bool,
}

impl Paragraph {
    fn heading(text: &str) -> Self {
        Self {
            text: text.to_string(),
            alignment: Alignment::Center,
            bold: true,
        }
    }

    fn line(text: String) -> Self {
        Self {
            text,
            alignment: Alignment::Left,
            bold: false,
        }
    }
}

/// Rendered plan, ready to be packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub paragraphs: Vec<Paragraph>,
    /// Table rows; the first row is the header.
    pub table: Vec<Vec<String>>,
    pub file_name: String,
}

impl PlanDocument {
    pub fn render(session: &CompletedSession, rows: &[PlanRow]) -> Self {
        let paragraphs = vec![
            Paragraph::heading(INSTITUTION),
            Paragraph::heading(TITLE),
            Paragraph::heading(TEACHER_LINE),
            Paragraph::line(format!("Ф.И.О.: {}", session.name)),
            Paragraph::line(format!("Класс: {CLASS_PLACEHOLDER}")),
            Paragraph::line(format!("Дата рождения: {}", session.birthdate)),
            Paragraph::line(format!("Цель: {}", session.goal)),
        ];

        let mut table = Vec::with_capacity(rows.len() + 1);
        table.push(TABLE_HEADERS.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push(vec![
                row.direction.clone(),
                row.task.clone(),
                row.topic.clone(),
                PLACEHOLDER_BLANK.to_string(),
                PLACEHOLDER_BLANK.to_string(),
                PLACEHOLDER_BLANK.to_string(),
            ]);
        }

        Self {
            paragraphs,
            table,
            file_name: file_name(&session.name),
        }
    }

    /// Header paragraphs joined by newlines.
    pub fn header_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Package as `.docx` and write it into `dir`. Returns the file path.
    ///
    /// The file on disk is always `TRANSIENT_FILE_NAME`; `dir` is expected to
    /// be private to one delivery and the user-facing name travels
    /// separately as `file_name`.
    pub async fn write_transient(&self, dir: &Path) -> Result<PathBuf, RenderError> {
        let bytes = self.to_docx()?;
        let path = dir.join(TRANSIENT_FILE_NAME);
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "Plan document written");
        Ok(path)
    }
}

/// Attachment name for a child's plan: spaces in the name become `_`.
pub fn file_name(name: &str) -> String {
    format!("{FILE_PREFIX}{}{FILE_EXTENSION}", name.replace(' ', "_"))
}
