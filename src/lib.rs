//! Plan Intake — collects a child's details over chat, generates an
//! individual work plan and returns it as a Word document.

pub mod channels;
pub mod config;
pub mod dialogue;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod generation;
pub mod plan;
pub mod session;
