//! The error type surfaced by this crate's `GraphRepository`/
//! `CapabilityRepository` implementations.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database unreachable: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("row decode failed: {0}: {1}")]
    Decode(&'static str, String),

    #[error("rejected database url {0}: only libsql://, file:, and :memory: are accepted")]
    InsecureUrl(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<Error> for graphrag_core::Error {
    fn from(err: Error) -> Self {
        graphrag_core::Error::Storage(err.to_string())
    }
}
