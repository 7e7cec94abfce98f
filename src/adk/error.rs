// SPDX-License-Identifier: MIT

//! Typed error handling for weft-rs
//!
//! Each layer owns its error enum; `WeftError` is the umbrella the loader,
//! builder and binary report through.

use thiserror::Error;

use crate::weft::workflow::checkpoint::CheckpointError;
use crate::weft::workflow::condition::ConditionError;
use crate::weft::workflow::graph::{GraphError, RunError};

/// Top-level error type for weft-rs
#[derive(Debug, Error)]
pub enum WeftError {
    /// Configuration errors (missing env vars, invalid workflow files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph construction or execution errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A run failed; carries the last merged state
    #[error(transparent)]
    Run(#[from] RunError),

    /// Model/LLM errors
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invalid `when` condition in a workflow file
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// Checkpoint storage errors outside of a run
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Unknown workflow pattern requested
    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Non-success HTTP status from the provider
    #[error("API error from {provider} ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// The model answered but the answer did not match the bound schema
    #[error("Structured output did not match schema '{schema}': {message}")]
    StructuredOutput { schema: String, message: String },

    /// A scripted model ran out of canned responses
    #[error("No scripted response left (served {served})")]
    Exhausted { served: usize },

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl WeftError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a structured output error
    pub fn structured(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StructuredOutput {
            schema: schema.into(),
            message: message.into(),
        }
    }
}
