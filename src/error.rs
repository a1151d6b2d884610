//! Error types for the companion client
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for companion operations
#[derive(Error, Debug)]
pub enum CompanionError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Handshake failure
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Session misuse or send failure
    #[error("Session error: {0}")]
    Session(String),

    /// Vehicle registry error
    #[error("Registry error: {0}")]
    Registry(String),
}

/// Failure classes for the gateway handshake.
///
/// `Transport` and `Protocol` fail only the current attempt and are safe to
/// retry. `Rejected` means the gateway refused our token; retrying with the
/// same shared secret cannot succeed, so callers must not spin on it.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Connect timeout, reset, or premature close
    #[error("transport: {0}")]
    Transport(String),

    /// Malformed JSON, wrong message type, or missing/invalid fields
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Gateway answered `accepted: false`
    #[error("gateway rejected hello (accepted=false)")]
    Rejected,
}

impl HandshakeError {
    /// True for the non-retriable rejection class.
    pub fn is_rejection(&self) -> bool {
        matches!(self, HandshakeError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_error_display() {
        let err = CompanionError::Config("invalid config".to_string());
        assert_eq!(format!("{}", err), "Configuration error: invalid config");

        let err = CompanionError::Session("not authenticated".to_string());
        assert_eq!(format!("{}", err), "Session error: not authenticated");

        let err = CompanionError::Registry("registry full".to_string());
        assert_eq!(format!("{}", err), "Registry error: registry full");
    }

    #[test]
    fn test_companion_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "io error");
        let err: CompanionError = io_err.into();
        assert!(matches!(err, CompanionError::Io(_)));
    }

    #[test]
    fn test_companion_error_from_handshake() {
        let hs_err = HandshakeError::Rejected;
        let err: CompanionError = hs_err.into();
        assert!(matches!(err, CompanionError::Handshake(_)));
    }

    #[test]
    fn test_handshake_error_display() {
        let err = HandshakeError::Transport("connection reset".to_string());
        assert_eq!(format!("{}", err), "transport: connection reset");

        let err = HandshakeError::Protocol("challenge nonce missing".to_string());
        assert_eq!(
            format!("{}", err),
            "protocol violation: challenge nonce missing"
        );

        let err = HandshakeError::Rejected;
        assert_eq!(format!("{}", err), "gateway rejected hello (accepted=false)");
    }

    #[test]
    fn test_handshake_error_rejection_class() {
        assert!(HandshakeError::Rejected.is_rejection());
        assert!(!HandshakeError::Transport("reset".into()).is_rejection());
        assert!(!HandshakeError::Protocol("bad json".into()).is_rejection());
    }
}
