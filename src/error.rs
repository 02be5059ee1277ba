//! Error types for document framing and record binding

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OdmError>;

#[derive(Error, Debug)]
pub enum OdmError {
    #[error("byte unit out of range: {0}")]
    InvalidByte(i32),

    #[error("document declares {declared} bytes, exceeding the {max}-byte ceiling")]
    OversizedDocument { declared: u32, max: u32 },

    #[error("document declares {0} bytes, below the minimum frame of 5")]
    UndersizedDocument(u32),

    #[error("sink rejected framed document: {0}")]
    Sink(#[source] Box<OdmError>),

    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    #[error("field '{field}' cannot be represented in a document: {reason}")]
    UnsupportedField { field: String, reason: String },

    #[error("field '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),
}

impl OdmError {
    /// True if the error originated downstream of the framer, in the sink.
    pub fn is_sink_failure(&self) -> bool {
        matches!(self, OdmError::Sink(_))
    }
}
