//! Gauge Protocol Communication
//!
//! Implements the line-oriented command/acknowledgement protocol spoken by the
//! gauge firmware.
//!
//! The host writes `"<position>,<duration_ms>\n"` and waits for a single reply
//! line. A reply starting with `ACK.` means the command was accepted; any other
//! text is a diagnostic from the device.

pub mod clock;
pub mod commands;
mod error;
pub mod response;
pub mod serial;
mod session;
pub mod timeout;
mod transport;

pub use clock::{Clock, SystemClock};
pub use commands::{decode, encode, Command, WireLine};
pub use error::ProtocolError;
pub use response::{classify, Outcome};
pub use serial::{list_ports, FlowControlSettings, Parity, PortInfo, SerialSettings};
pub use session::{CommandSession, SessionState};
pub use timeout::compute_window;
pub use transport::{SerialTransport, Transport};

/// Default baud rate of the gauge firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Timeout for a single blocking line read in milliseconds
///
/// Kept short so the session can re-check its overall deadline between reads.
pub const PER_READ_TIMEOUT_MS: u64 = 1000;

/// Highest needle position the gauge accepts
pub const MAX_POSITION: u8 = 100;

/// Longest transition duration the gauge accepts, in milliseconds
pub const MAX_DURATION_MS: u16 = 9999;

/// Prefix of an acknowledgement line
pub const ACK_TOKEN: &str = "ACK.";
