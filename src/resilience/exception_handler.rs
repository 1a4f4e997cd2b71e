//! Cross-task channel for fatal conditions.
//!
//! Stage tasks cannot unwind into the controller, so they report here and the
//! controller polls [`ExceptionHandler::has_error`] once per supervision tick.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;
use thiserror::Error;

/// Where a fatal condition arose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultOrigin {
    /// Configuration or resource preparation before steady state
    Initialization,

    /// Steady-state record processing
    Processing,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultOrigin::Initialization => write!(f, "initialization"),
            FaultOrigin::Processing => write!(f, "processing"),
        }
    }
}

/// A reported fatal condition
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{origin} fault in stage '{stage}': {cause}")]
pub struct FatalCondition {
    pub origin: FaultOrigin,
    pub stage: String,
    pub cause: String,
    pub reported_at: SystemTime,
}

impl FatalCondition {
    pub fn new(origin: FaultOrigin, stage: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            origin,
            stage: stage.into(),
            cause: cause.to_string(),
            reported_at: SystemTime::now(),
        }
    }

    pub fn initialization(stage: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::new(FaultOrigin::Initialization, stage, cause)
    }

    pub fn processing(stage: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::new(FaultOrigin::Processing, stage, cause)
    }

    /// Wrap a pipeline error, keeping its classification.
    pub fn from_error(stage: impl Into<String>, error: &PipelineError) -> Self {
        match error {
            PipelineError::Fatal(condition) => condition.clone(),
            other => Self::new(other.origin(), stage, other),
        }
    }
}

/// Thread-safe aggregator of fatal conditions for one fault-containment domain
#[derive(Debug, Default)]
pub struct ExceptionHandler {
    queue: Mutex<Vec<FatalCondition>>,
    has_error: AtomicBool,
}

impl ExceptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal condition. Never fails.
    pub fn report_exception(&self, condition: FatalCondition) {
        tracing::error!(
            stage = %condition.stage,
            origin = %condition.origin,
            "fatal condition reported: {}",
            condition.cause
        );

        let mut queue = self.lock();
        queue.push(condition);
        self.has_error.store(true, Ordering::Release);
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::Acquire)
    }

    /// Copy of every condition reported since the last clear, in report order
    pub fn exception_list(&self) -> Vec<FatalCondition> {
        self.lock().clone()
    }

    /// Surface the first-reported condition as an error, if any.
    pub fn rethrow_exception(&self) -> Result<(), PipelineError> {
        match self.lock().first() {
            Some(first) => Err(PipelineError::Fatal(first.clone())),
            None => Ok(()),
        }
    }

    /// Empty the queue. Returns how many conditions were discarded.
    pub fn clear_exceptions(&self) -> usize {
        let mut queue = self.lock();
        let cleared = queue.len();
        queue.clear();
        self.has_error.store(false, Ordering::Release);
        if cleared > 0 {
            tracing::info!("cleared {} fatal condition(s)", cleared);
        }
        cleared
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FatalCondition>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_stage_and_cause() {
        let condition = FatalCondition::processing("tcp-in", "connection reset");
        assert_eq!(
            condition.to_string(),
            "processing fault in stage 'tcp-in': connection reset"
        );
    }

    #[test]
    fn test_from_error_keeps_wrapped_condition() {
        let original = FatalCondition::initialization("file-in", "missing directory");
        let wrapped = FatalCondition::from_error("other", &PipelineError::Fatal(original.clone()));
        assert_eq!(wrapped, original);
    }
}
