//! Error types for the notification engine.

/// Errors that can occur during notification queries.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A database operation failed. Store unavailability surfaces here;
    /// retry and backoff are the caller's concern.
    #[error("notification query failed: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("notification payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}
