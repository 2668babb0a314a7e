//! Response classification
//!
//! Interprets the single reply line the gauge sends after a command.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::ACK_TOKEN;

/// Terminal result of one command exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// The device accepted the command (reply starts with `ACK.`)
    Acknowledged(String),
    /// The device replied with something other than an acknowledgement
    Unrecognized(String),
    /// Nothing was received before the timeout window closed
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
        /// Window that was allowed
        window: Duration,
    },
}

impl Outcome {
    /// Whether the command was acknowledged
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Acknowledged(_))
    }

    /// Raw reply text, if any was received
    pub fn payload(&self) -> Option<&str> {
        match self {
            Outcome::Acknowledged(p) | Outcome::Unrecognized(p) => Some(p),
            Outcome::TimedOut { .. } => None,
        }
    }

    /// Process exit code for this outcome
    ///
    /// 0 success, 1 device-reported error, 2 timeout.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Acknowledged(_) => 0,
            Outcome::Unrecognized(_) => 1,
            Outcome::TimedOut { .. } => 2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Acknowledged(payload) => write!(f, "SUCCESS: {}", payload),
            Outcome::Unrecognized(payload) => write!(f, "ERROR: {}", payload),
            Outcome::TimedOut { window, .. } => write!(
                f,
                "ERROR: Did not receive response within expected {} second timeframe.",
                window.as_secs()
            ),
        }
    }
}

/// Classify a raw reply line
///
/// Returns `None` for empty or whitespace-only input, which is what a timed
/// out read produces. Otherwise the trimmed line is `Acknowledged` when it
/// starts with the case-sensitive token `ACK.` and `Unrecognized` when it
/// does not; the trimmed text is kept as the payload in both cases.
pub fn classify(raw: &str) -> Option<Outcome> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with(ACK_TOKEN) {
        Some(Outcome::Acknowledged(line.to_string()))
    } else {
        Some(Outcome::Unrecognized(line.to_string()))
    }
}
