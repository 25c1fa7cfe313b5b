//! Error types for revd

use std::time::Duration;

use thiserror::Error;

/// Result type alias for revd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for revd operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Git command or repository error
    #[error("Git error: {0}")]
    Git(String),

    /// Reviewer process error
    #[error("Agent error: {0}")]
    Agent(String),

    /// A bounded operation ran past its deadline
    #[error("Timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    /// Error reported by a remote API (GitHub, chat webhook)
    #[error("Remote API error: {0}")]
    Remote(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short, stable name of the error class, as shown in failure comments
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Config(_) => "ConfigError",
            Error::Git(_) => "GitError",
            Error::Agent(_) => "AgentError",
            Error::Timeout(_) => "Timeout",
            Error::Remote(_) => "RemoteError",
            Error::Other(_) => "Error",
        }
    }
}
