//! Error types for Ralph
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::assistant::AssistantError;

/// All error types that can occur in Ralph
#[derive(Debug, Error)]
pub enum RalphError {
    /// Prompt file given on the command line does not exist
    #[error("Prompt file not found: {}", .0.display())]
    PromptFileNotFound(PathBuf),

    /// The initializer finished without writing a task list
    #[error("Task list not found: {}", .0.display())]
    TaskFileMissing(PathBuf),

    /// The task list exists but is not valid JSON
    #[error("Task list is not valid JSON ({}): {source}", .path.display())]
    InvalidTaskFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Assistant invocation failed in a way the caller cannot absorb
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Ralph operations
pub type Result<T> = std::result::Result<T, RalphError>;
