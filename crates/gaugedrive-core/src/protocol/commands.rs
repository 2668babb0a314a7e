//! Protocol commands
//!
//! Builds and parses the single command understood by the gauge firmware:
//! a needle position and a transition duration, comma separated and newline
//! terminated.

use serde::Serialize;
use std::fmt;

use super::{ProtocolError, MAX_DURATION_MS, MAX_POSITION};

/// A validated needle movement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Command {
    position: u8,
    duration_ms: u16,
}

impl Command {
    /// Create a command, rejecting values outside the ranges the firmware accepts
    pub fn new(position: u32, duration_ms: u32) -> Result<Self, ProtocolError> {
        if position > MAX_POSITION as u32 {
            return Err(ProtocolError::InvalidPosition(position));
        }
        if duration_ms > MAX_DURATION_MS as u32 {
            return Err(ProtocolError::InvalidDuration(duration_ms));
        }
        Ok(Self {
            position: position as u8,
            duration_ms: duration_ms as u16,
        })
    }

    /// Target needle position (0-100)
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Requested transition time in milliseconds (0-9999)
    pub fn duration_ms(&self) -> u16 {
        self.duration_ms
    }

    /// Encode this command into its wire line
    pub fn to_wire(&self) -> WireLine {
        WireLine(format!("{},{}\n", self.position, self.duration_ms))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "position {} over {}ms", self.position, self.duration_ms)
    }
}

/// The exact ASCII text sent to the device, terminator included
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireLine(String);

impl WireLine {
    /// Line as text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Line as raw bytes for transmission
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for WireLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end())
    }
}

/// Format a position/duration pair into a wire line
///
/// Inputs are re-validated even if the caller already checked them.
pub fn encode(position: u32, duration_ms: u32) -> Result<WireLine, ProtocolError> {
    Command::new(position, duration_ms).map(|cmd| cmd.to_wire())
}

/// Parse a wire line back into a command
///
/// Accepts an optional `\n` or `\r\n` terminator. Anything besides two
/// unsigned decimal integers separated by a comma is rejected.
pub fn decode(line: &str) -> Result<Command, ProtocolError> {
    let body = line
        .strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line);

    let malformed = || ProtocolError::MalformedCommand(line.to_string());

    let (position, duration) = body.split_once(',').ok_or_else(malformed)?;
    let position = parse_decimal(position).ok_or_else(malformed)?;
    let duration = parse_decimal(duration).ok_or_else(malformed)?;

    Command::new(position, duration)
}

/// Parse a run of ASCII digits; `u32::from_str` alone would accept a leading `+`
fn parse_decimal(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_examples() {
        assert_eq!(encode(50, 300).unwrap().as_str(), "50,300\n");
        assert_eq!(encode(0, 0).unwrap().as_str(), "0,0\n");
        assert_eq!(encode(100, 9999).unwrap().as_bytes(), b"100,9999\n");
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(matches!(
            encode(101, 0),
            Err(ProtocolError::InvalidPosition(101))
        ));
        assert!(matches!(
            encode(0, 10_000),
            Err(ProtocolError::InvalidDuration(10_000))
        ));
    }

    #[test]
    fn test_wire_line_only_digits_comma_newline() {
        let line = encode(7, 42).unwrap();
        assert!(line
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '\n'));
        assert!(line.as_str().ends_with('\n'));
        assert_eq!(line.to_string(), "7,42");
    }

    #[test]
    fn test_decode_round_trip_full_domain() {
        for position in 0..=MAX_POSITION as u32 {
            for duration in (0..=MAX_DURATION_MS as u32).step_by(7).chain([9999]) {
                let line = encode(position, duration).unwrap();
                let cmd = decode(line.as_str()).unwrap();
                assert_eq!(cmd.position() as u32, position);
                assert_eq!(cmd.duration_ms() as u32, duration);
            }
        }
    }

    #[test]
    fn test_decode_accepts_crlf() {
        let cmd = decode("12,34\r\n").unwrap();
        assert_eq!(cmd, Command::new(12, 34).unwrap());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for line in ["", "\n", "50\n", "50,\n", ",300\n", "+5,300\n", "5,-3\n", "a,b\n", "5,3,1\n"] {
            assert!(
                matches!(decode(line), Err(ProtocolError::MalformedCommand(_))),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        assert!(matches!(
            decode("150,0\n"),
            Err(ProtocolError::InvalidPosition(150))
        ));
    }

    #[test]
    fn test_command_display() {
        let cmd = Command::new(30, 500).unwrap();
        assert_eq!(cmd.to_string(), "position 30 over 500ms");
    }
}
