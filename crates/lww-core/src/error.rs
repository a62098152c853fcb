//! Error types for LWW Core

use thiserror::Error;

/// Core error types
///
/// A value that was never raised is not an error: lookups report it as
/// `None`. The in-memory backend never produces any of these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Marshal error: {0}")]
    Marshal(String),

    #[error("Timestamp out of range: {0}")]
    TimestampOutOfRange(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for LWW Core operations
pub type Result<T> = std::result::Result<T, Error>;
