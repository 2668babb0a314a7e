//! # GaugeDrive Core Library
//!
//! Core functionality for driving a microcontroller-attached analog gauge.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial transport with line-oriented reads and explicit port settings
//! - Command encoding for the `<position>,<duration_ms>` wire format
//! - Adaptive response timeouts derived from the transition duration
//! - Acknowledgement classification and the command session state machine
//! - A simulated gauge for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use gaugedrive_core::protocol::{Command, CommandSession, SerialSettings, SerialTransport};
//!
//! let mut transport = SerialTransport::open("/dev/ttyACM0", &SerialSettings::default())?;
//! let command = Command::new(50, 300)?;
//! let outcome = CommandSession::new(&mut transport, command).run()?;
//! println!("{}", outcome);
//! ```

pub mod demo;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::demo::DemoGauge;
    pub use crate::protocol::{
        classify, compute_window, Clock, Command, CommandSession, Outcome, ProtocolError,
        SerialSettings, SerialTransport, SystemClock, Transport, WireLine,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
