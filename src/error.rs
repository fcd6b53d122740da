//! Error types for sayd

use std::io;
use thiserror::Error;

/// Main error type for sayd
#[derive(Error, Debug)]
pub enum SaydError {
    /// The synthesis engine could not be initialized or configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single synthesis request failed
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("No active playback")]
    NoActivePlayback,

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Audio player error: {0}")]
    Player(String),

    /// A blocking device call was interrupted by cancellation
    #[error("Interrupted by cancellation")]
    Interrupted,

    #[error("Speech plugin not initialized, start plugin first")]
    NotStarted,

    #[error("Playback supervisor has been shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl SaydError {
    /// Whether this error is the expected side effect of canceling playback
    ///
    /// Killing a player while its stdin is still being fed surfaces as a
    /// broken pipe on the feeding thread.
    pub fn is_interruption(&self) -> bool {
        match self {
            SaydError::Interrupted => true,
            SaydError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Result type alias for sayd operations
pub type Result<T> = std::result::Result<T, SaydError>;

impl From<String> for SaydError {
    fn from(s: String) -> Self {
        SaydError::Other(s)
    }
}

impl From<&str> for SaydError {
    fn from(s: &str) -> Self {
        SaydError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for SaydError {
    fn from(e: serde_json::Error) -> Self {
        SaydError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruption_classification() {
        assert!(SaydError::Interrupted.is_interruption());
        assert!(SaydError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_interruption());
        assert!(!SaydError::Io(io::Error::from(io::ErrorKind::NotFound)).is_interruption());
        assert!(!SaydError::Synthesis("bad".into()).is_interruption());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SaydError::Synthesis("no voice".into()).to_string(),
            "Speech synthesis error: no voice"
        );
        assert_eq!(
            SaydError::Unsupported("resume").to_string(),
            "Operation not supported: resume"
        );
    }
}
