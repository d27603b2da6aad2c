//! Core types for the expense agent
//!
//! This crate provides foundational types used across all other crates:
//! - Expense vocabulary (categories, intents, input methods)
//! - Stage results for extraction and validation
//! - The final pipeline result handed to callers
//! - The schema registry (the JSON contract with generative backends)
//! - Error types

pub mod error;
pub mod expense;
pub mod extraction;
pub mod result;
pub mod schema;
pub mod validation;

pub use error::{Error, Result};
pub use expense::{Category, InputMethod, Intent};
pub use extraction::{ExtractedFields, ExtractionMetadata, ExtractionResponse, ExtractionResult};
pub use result::{ExpenseRecord, FailureKind, PipelineResult};
pub use schema::{
    get_schema, list_action_schemas, FieldSpec, FieldType, Schema, SchemaName,
};
pub use validation::{
    NormalizedFields, Suggestions, ValidationMetadata, ValidationResponse, ValidationResult,
};
