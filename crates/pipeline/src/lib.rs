//! Two-stage expense pipeline
//!
//! Extraction turns free text into guessed fields and an intent. Only
//! `add_expense` proceeds to validation, which checks and normalizes the
//! guesses. Every failure is recovered into a `PipelineResult`.

pub mod pipeline;
pub mod prompts;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use pipeline::{ExpensePipeline, PipelineError, PipelineRequest};
pub use prompts::{
    build_categorization_prompt, build_extraction_prompt, build_validation_prompt, PromptPair,
};
