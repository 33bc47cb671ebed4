//! The error type surfaced by this crate's tool handlers, mapped to
//! JSON-RPC error codes at the transport boundary.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error(transparent)]
    Core(#[from] graphrag_core::Error),

    #[error("sampling request timed out")]
    SamplingTimeout,

    #[error("sampling request channel closed before a reply arrived")]
    SamplingChannelClosed,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC 2.0 reserved error code for this variant.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidParams(_) => -32602,
            Error::MethodNotFound(_) => -32601,
            Error::Json(_) => -32700,
            Error::SamplingTimeout | Error::SamplingChannelClosed => -32001,
            Error::Core(_) | Error::Io(_) => -32000,
        }
    }
}
