//! Plan content: the prompt sent to the generator and the rows parsed back.

pub mod parser;
pub mod prompt;

pub use parser::{PlanRow, parse_rows};
pub use prompt::build_prompt;
