//! Per-conversation session storage.
//!
//! A `Session` holds the three fields collected during one dialogue pass.
//! It lives as long as its conversation's worker and survives a finished
//! generation so `/reset` can reuse it.

/// A field collected from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Name,
    Birthdate,
    Goal,
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Birthdate => "birthdate",
            Self::Goal => "goal",
        };
        write!(f, "{s}")
    }
}

/// Collected fields of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    name: Option<String>,
    birthdate: Option<String>,
    goal: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: SessionField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: SessionField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    /// Forget every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fields that have not been collected yet.
    pub fn missing(&self) -> Vec<SessionField> {
        [SessionField::Name, SessionField::Birthdate, SessionField::Goal]
            .into_iter()
            .filter(|f| self.slot(*f).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Snapshot of the session, available only once every field is present.
    pub fn completed(&self) -> Option<CompletedSession> {
        Some(CompletedSession {
            name: self.name.clone()?,
            birthdate: self.birthdate.clone()?,
            goal: self.goal.clone()?,
        })
    }

    fn slot(&self, field: SessionField) -> &Option<String> {
        match field {
            SessionField::Name => &self.name,
            SessionField::Birthdate => &self.birthdate,
            SessionField::Goal => &self.goal,
        }
    }

    fn slot_mut(&mut self, field: SessionField) -> &mut Option<String> {
        match field {
            SessionField::Name => &mut self.name,
            SessionField::Birthdate => &mut self.birthdate,
            SessionField::Goal => &mut self.goal,
        }
    }
}

/// A session with all fields present. Document rendering only accepts this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSession {
    pub name: String,
    pub birthdate: String,
    pub goal: String,
}
