//! Error types for the contact search pipeline.

use thiserror::Error;

/// Main error type for search operations.
///
/// Cloneable so that a single upstream failure can be delivered to every
/// observer of the shared view.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Contact permission not granted")]
    PermissionDenied,

    #[error("Subscription dropped")]
    SubscriptionDropped,

    #[error("Pipeline disconnected")]
    Disconnected,

    #[error("Contact has no number: {0}")]
    NoNumber(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Serialization(e.to_string())
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
