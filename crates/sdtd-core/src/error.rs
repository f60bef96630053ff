//! Error types for the telnet console

use thiserror::Error;

/// Result type for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Console error types
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Dial failed or timed out
    #[error("Connect error: {0}")]
    Connect(String),

    /// Read failed, timed out, or the server closed the stream
    #[error("Read error: {0}")]
    Read(String),

    /// Write or flush failed
    #[error("Write error: {0}")]
    Write(String),

    /// Login confirmation marker absent
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Player body line is structurally malformed
    #[error("Failed to parse player line: '{fragment}'")]
    PlayerParse { fragment: String },

    /// Game clock line did not match `Day <d>, <h>:<m>`
    #[error("Invalid time format: {0}")]
    Format(String),

    /// Command issued on a session that is not ready for one
    #[error("Session not ready: {0}")]
    NotReady(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,
}

impl ConsoleError {
    /// Build a player parse error for the offending fragment
    pub fn player_parse(fragment: impl Into<String>) -> Self {
        ConsoleError::PlayerParse {
            fragment: fragment.into(),
        }
    }

    /// True for errors raised while parsing a response body
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ConsoleError::PlayerParse { .. } | ConsoleError::Format(_)
        )
    }
}
