//! Top-level error for `notify` calls.
//!
//! Every stage failure surfaces here unmodified; nothing in the pipeline
//! swallows or retries an error.

use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::signing::SigningError;

/// Result type for pipeline and notifier operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors surfaced to `Notifier::notify` callers.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Stage '{stage}' broke the pipeline contract: {message}")]
    PipelineContract { stage: String, message: String },

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Notifier body did not complete: {0}")]
    Aborted(String),
}
