//! Dialogue: the intake state machine and the controller that executes it.
//!
//! The flow collects the child's name, birthdate and work goal, then
//! generates a plan and sends it back as a document. `/reset` regenerates
//! from the stored fields; `/cancel` abandons the current pass.

pub mod controller;
pub mod messages;
pub mod state;

pub use controller::{Controller, Conversation, PipelineOutcome};
pub use state::{DialogueState, Effect, Event, Transition, transition};
