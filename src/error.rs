use thiserror::Error;

/// Errors raised while folding rows into documents
#[derive(Debug, Error)]
pub enum CastError {
    /// A path step needs an object or sequence where a leaf is stored, or the reverse
    #[error("illegal prefix `{prefix}`: key already holds an incompatible value")]
    Conflict { prefix: String },

    #[error("malformed path `{path}`: {reason}")]
    MalformedPath { path: String, reason: &'static str },

    #[error("unknown operation type `{0}`")]
    UnknownOperation(String),

    /// The serializer met a value it has no JSON rendering for
    #[error("cannot render value of type `{0}`")]
    UnsupportedType(&'static str),

    #[error("sink does not support `{0}`")]
    UnsupportedOperation(&'static str),

    #[error("no sink registered under `{0}`")]
    UnknownSink(String),

    #[error("invalid row source: {0}")]
    InvalidSource(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CastError>;
