//! Error types for the Strand core.

/// Core error type for Strand infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum StrandError {
    /// Configuration error (bad file, malformed line, invalid value).
    #[error("configuration error: {0}")]
    Config(String),

    /// The transport dropped its end of a message channel.
    #[error("message channel closed by transport")]
    ChannelClosed,

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for Strand operations.
pub type StrandResult<T> = Result<T, StrandError>;
