//! Error types shared across the pipeline.
//!
//! Library code returns [`PipelineError`]; configuration problems are
//! [`ConfigError`] and always classify as initialization faults.

use crate::resilience::{FatalCondition, FaultOrigin};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(String),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown {kind} component '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("invalid pipeline layout: {0}")]
    Layout(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fatal(#[from] FatalCondition),
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Classify the error for the exception handler.
    pub fn origin(&self) -> FaultOrigin {
        match self {
            PipelineError::Config(_)
            | PipelineError::UnknownComponent { .. }
            | PipelineError::Layout(_)
            | PipelineError::InvalidTransition { .. } => FaultOrigin::Initialization,
            PipelineError::Stage { .. } | PipelineError::Io(_) => FaultOrigin::Processing,
            PipelineError::Fatal(condition) => condition.origin,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
