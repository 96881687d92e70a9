//! Parser for the generator's pipe-delimited plan text.

/// Number of `|`-separated segments a line needs to become a row.
pub const PLAN_COLUMNS: usize = 3;

/// One accepted line of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRow {
    /// Area of work, e.g. the emotional-volitional sphere.
    pub direction: String,
    /// Correctional tasks for that area.
    pub task: String,
    /// Session topics covering the tasks.
    pub topic: String,
}

impl PlanRow {
    pub fn new(
        direction: impl Into<String>,
        task: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            direction: direction.into(),
            task: task.into(),
            topic: topic.into(),
        }
    }

    /// Parse a single line. Returns `None` unless it splits into exactly
    /// three segments.
    ///
    /// A row whose free text itself contains `|` yields more segments and is
    /// rejected too.
    pub fn from_line(line: &str) -> Option<Self> {
        if line.trim().is_empty() {
            return None;
        }
        let segments: Vec<&str> = line.split('|').collect();
        let [direction, task, topic] = segments.as_slice() else {
            return None;
        };
        Some(Self::new(direction.trim(), task.trim(), topic.trim()))
    }
}

/// Split generated text into plan rows, dropping every line that is not a
/// three-column row (`---` separators, prose, headers).
pub fn parse_rows(raw: &str) -> Vec<PlanRow> {
    let rows: Vec<PlanRow> = raw.lines().filter_map(PlanRow::from_line).collect();
    tracing::debug!(
        accepted = rows.len(),
        lines = raw.lines().count(),
        "Parsed generated plan"
    );
    rows
}
