//! Error types for the Scrivener domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the workflow wraps the
//! provider and store errors it can hit.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider ran out of scripted responses after {0} calls")]
    Exhausted(usize),
}

/// Integrity and persistence failures of the entity store and outline log.
///
/// `DuplicateKey` and `AmbiguousKey` are integrity violations: the name is
/// the unique key and more than one entity carries it. They abort the
/// operation instead of guessing which entity was meant.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entity name '{0}': names must be unique")]
    DuplicateKey(String),

    #[error("Ambiguous entity name '{0}': more than one entity matches")]
    AmbiguousKey(String),

    #[error("Invalid timestamp '{0}': expected YYYYMMDDHHMM")]
    InvalidStamp(String),

    #[error("Timestamp {given} for '{name}' is older than its latest fact ({latest})")]
    OutOfOrder {
        name: String,
        latest: String,
        given: String,
    },

    #[error("Batch is malformed: {0}")]
    MalformedBatch(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Generation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Commit failed: {0}")]
    Store(#[from] StoreError),

    #[error("Workflow is already finalized")]
    Finalized,
}
