//! Error types for HL7 message processing

use thiserror::Error;

/// Result type alias for hale operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the hale engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("empty message")]
    EmptyMessage,

    #[error("message does not start with an MSH segment")]
    MissingMsh,

    #[error("MSH prefix shorter than 8 bytes")]
    ShortMsh,

    #[error("malformed encoding characters: {0}")]
    MalformedEncoding(String),

    #[error("builder error: {0}")]
    Builder(String),

    #[error("frame error: {0}")]
    Frame(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("send failed after {attempts} attempts: {last}")]
    SendFailed { attempts: u32, last: Box<Error> },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a builder error
    pub fn builder<S: Into<String>>(msg: S) -> Self {
        Error::Builder(msg.into())
    }

    /// Create a frame error
    pub fn frame<S: Into<String>>(msg: S) -> Self {
        Error::Frame(msg.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Error::Network(msg.into())
    }
}
