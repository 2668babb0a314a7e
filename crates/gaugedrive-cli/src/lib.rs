//! Shared plumbing for the GaugeDrive command line tools
//!
//! Argument groups, logging setup and device opening used by both the
//! `gaugedrive` and `gaugedrive-stimulus` binaries.

use anyhow::{Context, Result};
use clap::Args;
use gaugedrive_core::demo::DemoGauge;
use gaugedrive_core::protocol::{ProtocolError, SerialSettings, SerialTransport, Transport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Device name that selects the simulated gauge instead of a serial port
pub const DEMO_DEVICE: &str = "demo";

/// Process exit codes
pub mod exit {
    /// Command acknowledged
    pub const SUCCESS: u8 = 0;
    /// Device replied with something other than an acknowledgement
    pub const DEVICE_ERROR: u8 = 1;
    /// No reply within the timeout window
    pub const TIMEOUT: u8 = 2;
    /// Bad arguments or configuration
    pub const INVALID_ARGUMENTS: u8 = 3;
    /// Device could not be opened, or the link failed mid-command
    pub const CONNECTION: u8 = 4;
}

/// Serial link options shared by every tool
#[derive(Args, Debug, Clone, Default)]
pub struct SerialArgs {
    /// JSON file with serial settings; flags below override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Baud rate (must match the sketch running on the board)
    #[arg(long, value_name = "RATE")]
    pub baud: Option<u32>,

    /// Timeout of each individual read, in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..=60_000))]
    pub read_timeout_ms: Option<u64>,

    /// Disable RTS/CTS hardware flow control
    #[arg(long)]
    pub no_rts_cts: bool,

    /// Do not assert DTR
    #[arg(long)]
    pub no_dtr: bool,
}

impl SerialArgs {
    /// Resolve the effective settings: defaults, then config file, then flags
    pub fn settings(&self) -> Result<SerialSettings, ProtocolError> {
        let mut settings = match &self.config {
            Some(path) => SerialSettings::load(path)?,
            None => SerialSettings::default(),
        };
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(ms) = self.read_timeout_ms {
            settings.per_read_timeout_ms = ms;
        }
        if self.no_rts_cts {
            settings.flow_control.rts_cts = false;
        }
        if self.no_dtr {
            settings.flow_control.dtr_dsr = false;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Open the gauge at `device`, or the simulator when `device` is [`DEMO_DEVICE`]
pub fn open_device(device: &str, settings: &SerialSettings) -> Result<Box<dyn Transport>> {
    if device == DEMO_DEVICE {
        info!("Using simulated gauge");
        return Ok(Box::new(DemoGauge::new()));
    }
    let transport = SerialTransport::open(device, settings)
        .with_context(|| format!("Could not open {}", device))?;
    Ok(Box::new(transport))
}

/// Map an error to the exit code reported for it
pub fn error_exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ProtocolError>() {
        Some(e) if e.is_validation() => exit::INVALID_ARGUMENTS,
        Some(ProtocolError::ConfigError(_)) => exit::INVALID_ARGUMENTS,
        _ => exit::CONNECTION,
    }
}

/// Print an error the way the tools report failures and turn it into an exit code
pub fn report_error(err: &anyhow::Error) -> ExitCode {
    println!("ERROR: {:#}", err);
    ExitCode::from(error_exit_code(err))
}

/// Initialise logging to stderr
///
/// `verbosity` counts `-v` flags; `RUST_LOG` takes precedence when set.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gaugedrive_core={level},gaugedrive_cli={level},gaugedrive={level},gaugedrive_stimulus={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_override_defaults() {
        let args = SerialArgs {
            baud: Some(115200),
            read_timeout_ms: Some(200),
            no_rts_cts: true,
            ..Default::default()
        };
        let settings = args.settings().unwrap();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.per_read_timeout_ms, 200);
        assert!(!settings.flow_control.rts_cts);
        assert!(settings.flow_control.dtr_dsr);
    }

    #[test]
    fn test_no_flags_gives_firmware_defaults() {
        let settings = SerialArgs::default().settings().unwrap();
        assert_eq!(settings, SerialSettings::default());
    }

    #[test]
    fn test_zero_baud_is_rejected() {
        let args = SerialArgs {
            baud: Some(0),
            ..Default::default()
        };
        assert!(matches!(args.settings(), Err(ProtocolError::ConfigError(_))));
    }

    #[test]
    fn test_error_exit_codes() {
        let err = anyhow::Error::new(ProtocolError::InvalidPosition(120));
        assert_eq!(error_exit_code(&err), exit::INVALID_ARGUMENTS);

        let err = anyhow::Error::new(ProtocolError::ConnectionFailed("busy".into()))
            .context("Could not open /dev/ttyACM0");
        assert_eq!(error_exit_code(&err), exit::CONNECTION);

        let err = anyhow::Error::new(ProtocolError::ConfigError("bad".into()));
        assert_eq!(error_exit_code(&err), exit::INVALID_ARGUMENTS);
    }

    #[test]
    fn test_demo_device_opens_without_hardware() {
        assert!(open_device(DEMO_DEVICE, &SerialSettings::default()).is_ok());
    }
}
