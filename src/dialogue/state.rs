//! Dialogue state machine — which field the conversation is waiting for.
//!
//! `transition` is pure: it updates the session and returns the next state
//! plus the effects to run. Executing effects is the controller's job.

use crate::channels::OutgoingMessage;
use crate::session::{Session, SessionField};

use super::messages;

/// Where a conversation stands.
///
/// Progresses linearly: AwaitingName → AwaitingBirthdate → AwaitingGoal →
/// Terminated. A conversation that never saw `/start` is `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    AwaitingName,
    AwaitingBirthdate,
    AwaitingGoal,
    #[default]
    Terminated,
}

impl DialogueState {
    /// Whether this state ends the dialogue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingBirthdate => "awaiting_birthdate",
            Self::AwaitingGoal => "awaiting_goal",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// An inbound message, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    Reset,
    Cancel,
    /// Any other `/command`. Carries the command name without the slash.
    UnknownCommand(String),
    Text(String),
}

impl Event {
    /// Classify raw message text. `/start@SomeBot args` is `/start`.
    pub fn parse(text: &str) -> Self {
        let Some(command) = text.trim_start().strip_prefix('/') else {
            return Self::Text(text.to_string());
        };
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        match name {
            "start" => Self::Start,
            "reset" => Self::Reset,
            "cancel" => Self::Cancel,
            other => Self::UnknownCommand(other.to_string()),
        }
    }
}

/// Work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(OutgoingMessage),
    /// Generate, render and deliver a plan from the session.
    RunPipeline,
}

impl Effect {
    fn reply(text: &str) -> Self {
        Self::Reply(OutgoingMessage::text(text))
    }
}

/// Result of feeding one event to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: DialogueState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: DialogueState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn ignore(state: DialogueState) -> Self {
        Self::to(state, Vec::new())
    }

    /// Whether the event was dropped without effect.
    pub fn is_ignored(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Apply `event` in `state`, updating `session` as needed.
pub fn transition(state: DialogueState, event: Event, session: &mut Session) -> Transition {
    use DialogueState::*;

    match (state, event) {
        (_, Event::Start) => {
            session.clear();
            Transition::to(
                AwaitingName,
                vec![
                    Effect::Reply(messages::developer()),
                    Effect::reply(messages::WELCOME),
                ],
            )
        }

        (_, Event::Reset) => {
            if session.is_complete() {
                Transition::to(
                    Terminated,
                    vec![Effect::reply(messages::REGENERATING), Effect::RunPipeline],
                )
            } else {
                Transition::to(Terminated, vec![Effect::reply(messages::NO_SAVED_DATA)])
            }
        }

        (Terminated, Event::Cancel) => Transition::ignore(Terminated),
        (_, Event::Cancel) => {
            Transition::to(Terminated, vec![Effect::reply(messages::CANCELLED)])
        }

        (state, Event::UnknownCommand(_)) => Transition::ignore(state),
        (Terminated, Event::Text(_)) => Transition::ignore(Terminated),

        (AwaitingName, Event::Text(text)) => {
            session.set(SessionField::Name, text);
            Transition::to(AwaitingBirthdate, vec![Effect::reply(messages::ASK_BIRTHDATE)])
        }
        (AwaitingBirthdate, Event::Text(text)) => {
            session.set(SessionField::Birthdate, text);
            Transition::to(AwaitingGoal, vec![Effect::reply(messages::ASK_GOAL)])
        }
        (AwaitingGoal, Event::Text(text)) => {
            session.set(SessionField::Goal, text);
            Transition::to(Terminated, vec![Effect::RunPipeline])
        }
    }
}
