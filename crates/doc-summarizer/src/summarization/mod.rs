//! Summary generation on top of a `SummaryProvider`

mod pipeline;
pub mod prompt;

pub use pipeline::{SummaryOutput, Summarizer};
pub use prompt::PromptBuilder;
