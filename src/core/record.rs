use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A data-fault annotation attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Field the fault refers to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub message: String,
}

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// One decoded unit of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    /// Name of the stream the record was read from
    pub stream: String,

    /// Position within the stream, starting at 0
    pub sequence: u64,

    /// Raw content as read from the source
    pub payload: String,

    /// Fields populated by downstream mappers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RecordError>,
}

impl DataRecord {
    pub fn new(stream: impl Into<String>, sequence: u64, payload: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            sequence,
            payload: payload.into(),
            fields: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Attach a data fault. Annotations with an empty message are ignored.
    pub fn add_error(&mut self, error: RecordError) {
        if !error.message.trim().is_empty() {
            self.errors.push(error);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Unit of work moved between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Start of a stream
    Header { stream: String },

    /// End of a stream
    Trailer { stream: String },

    Data(DataRecord),
}

/// Classification of a record as seen by downstream stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Header,
    Trailer,
    Data,
    Error,
}

impl Record {
    pub fn header(stream: impl Into<String>) -> Self {
        Record::Header {
            stream: stream.into(),
        }
    }

    pub fn trailer(stream: impl Into<String>) -> Self {
        Record::Trailer {
            stream: stream.into(),
        }
    }

    pub fn data(stream: impl Into<String>, sequence: u64, payload: impl Into<String>) -> Self {
        Record::Data(DataRecord::new(stream, sequence, payload))
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Header { .. } => RecordKind::Header,
            Record::Trailer { .. } => RecordKind::Trailer,
            Record::Data(data) if data.has_errors() => RecordKind::Error,
            Record::Data(_) => RecordKind::Data,
        }
    }

    pub fn stream(&self) -> &str {
        match self {
            Record::Header { stream } | Record::Trailer { stream } => stream,
            Record::Data(data) => &data.stream,
        }
    }

    pub fn as_data(&self) -> Option<&DataRecord> {
        match self {
            Record::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_data_mut(&mut self) -> Option<&mut DataRecord> {
        match self {
            Record::Data(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_annotation_changes_kind() {
        let mut record = Record::data("s1", 0, "a,b");
        assert_eq!(record.kind(), RecordKind::Data);

        record
            .as_data_mut()
            .unwrap()
            .add_error(RecordError::for_field("duration", "not a number"));
        assert_eq!(record.kind(), RecordKind::Error);
    }

    #[test]
    fn test_empty_annotation_is_ignored() {
        let mut data = DataRecord::new("s1", 3, "x");
        data.add_error(RecordError::new("  "));
        assert!(!data.has_errors());
    }

    #[test]
    fn test_framing_records_carry_stream_name() {
        assert_eq!(Record::header("cdr_001").stream(), "cdr_001");
        assert_eq!(Record::trailer("cdr_001").kind(), RecordKind::Trailer);
    }
}
