//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
///
/// Timeouts and non-ACK replies are not errors: they are reported as an
/// [`Outcome`](super::Outcome) of the session.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid position {0}: must be between 0 and {max}", max = super::MAX_POSITION)]
    InvalidPosition(u32),

    #[error("Invalid duration {0}ms: must be between 0 and {max}", max = super::MAX_DURATION_MS)]
    InvalidDuration(u32),

    #[error("Malformed command line: {0:?}")]
    MalformedCommand(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error was caused by invalid input rather than the device
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidPosition(_)
                | ProtocolError::InvalidDuration(_)
                | ProtocolError::MalformedCommand(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_the_limit() {
        let err = ProtocolError::InvalidPosition(101);
        assert_eq!(err.to_string(), "Invalid position 101: must be between 0 and 100");

        let err = ProtocolError::InvalidDuration(10_000);
        assert_eq!(
            err.to_string(),
            "Invalid duration 10000ms: must be between 0 and 9999"
        );
    }

    #[test]
    fn test_is_validation() {
        assert!(ProtocolError::InvalidPosition(200).is_validation());
        assert!(ProtocolError::MalformedCommand("x".into()).is_validation());
        assert!(!ProtocolError::ConnectionFailed("busy".into()).is_validation());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!ProtocolError::from(io).is_validation());
    }
}
