use serde::{Deserialize, Serialize};

/// What a transform stage does with a record whose mapping failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFaultPolicy {
    /// Attach the fault to the record and forward it as an Error record
    #[default]
    Annotate,

    /// Drop the record and count it
    Discard,
}
