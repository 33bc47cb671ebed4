//! Error taxonomy for the GraphRAG planning engine.
//!
//! Error kinds mirror the propagation policy in the specification: learning
//! paths (§ `LearningLoop`) absorb recoverable errors and keep serving in a
//! degraded mode, while request-serving paths (`Suggester`, `Predictor`)
//! surface fatal errors to their caller.

/// Result type alias for planning-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the GraphRAG planning engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A loaded configuration failed validation (out-of-range field or a
    /// probability group that doesn't sum to 1.0 within tolerance). Fatal
    /// at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The relational store could not be reached during `Sync`. Fatal to
    /// the caller; in-memory state is left untouched.
    #[error("database unavailable: {0}")]
    DbUnavailable(String),

    /// A persisted edge referenced a node missing from the load batch.
    /// The row is skipped and logged, not fatal.
    #[error("sync consistency: {0}")]
    SyncConsistency(String),

    /// Semantic search returned nothing, or every candidate was filtered.
    /// `Suggest` returns `Ok(None)`, `PredictNext` returns `Ok(vec![])`.
    #[error("no candidates available")]
    NoCandidates,

    /// Confidence landed in `[suggestion_reject, suggestion_floor)`; the
    /// plan is still returned, carrying a warning.
    #[error("low confidence: {0:.3}")]
    LowConfidence(f64),

    /// Confidence fell below `suggestion_reject`; no plausible plan.
    #[error("suggestion rejected: confidence {0:.3} below threshold")]
    Rejection(f64),

    /// A DAG rebuild produced a cycle; the rebuild is rejected and the
    /// prior DAG is kept.
    #[error("cycle detected during DAG rebuild")]
    CycleDetected,

    /// Metrics recomputation failed; maps are reset to empty and the
    /// engine degrades to semantic-only scoring.
    #[error("metrics computation failed: {0}")]
    MetricsComputation(String),

    /// An outbound sampling request was not answered within its timeout.
    #[error("sampling request timed out")]
    Timeout,

    /// A single edge upsert failed during `PersistEdges`. Logged and
    /// skipped; not fatal to the batch.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A predicted tool matched the danger list and was silently excluded.
    /// Carried as a value, not surfaced to callers, but useful for tests
    /// and tracing.
    #[error("prediction excluded by danger filter: {0}")]
    Danger(String),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse failure.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO failure (config file reads, etc).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for storage-backend errors surfaced through the
    /// `GraphRepository` port.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether this error is recoverable by the caller (can retry, or
    /// continue serving in a degraded mode) versus fatal to the request.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::SyncConsistency(_)
            | Error::NoCandidates
            | Error::LowConfidence(_)
            | Error::Rejection(_)
            | Error::CycleDetected
            | Error::MetricsComputation(_)
            | Error::Persistence(_)
            | Error::Danger(_) => true,
            Error::ConfigInvalid(_)
            | Error::DbUnavailable(_)
            | Error::Timeout
            | Error::Serialization(_)
            | Error::Yaml(_)
            | Error::Io(_)
            | Error::Storage(_) => false,
        }
    }
}
