//! gaugedrive - move the needle of a serial-attached analog gauge
//!
//! Sends one `<position>,<duration_ms>` command and reports the device reply:
//!
//! ```text
//! gaugedrive /dev/ttyACM0 75 500
//! SUCCESS: ACK.
//! ```

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use gaugedrive_cli::{exit, init_logging, open_device, report_error, SerialArgs};
use gaugedrive_core::protocol::{list_ports, Command, CommandSession, Outcome};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "gaugedrive",
    version,
    about = "Move the needle of a serial-attached analog gauge",
    after_help = "DEVICE is the board's serial port, e.g. COM3 (Windows), /dev/ttyACM0 (Linux) \
                  or /dev/tty.usbserial-AM01QKUP (macOS). Use \"demo\" for a simulated gauge."
)]
struct Cli {
    /// Serial port the gauge is attached to
    #[arg(required_unless_present = "list_ports")]
    device: Option<String>,

    /// Needle position between 0 and 100
    #[arg(
        required_unless_present = "list_ports",
        value_parser = clap::value_parser!(u32).range(0..=100)
    )]
    position: Option<u32>,

    /// Time to move the needle, 0-9999 milliseconds
    #[arg(default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=9999))]
    duration_ms: u32,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    serial: SerialArgs,
}

/// Machine-readable result for `--json`
#[derive(Serialize)]
struct Report<'a> {
    device: &'a str,
    command: &'a Command,
    outcome: &'a Outcome,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            return ExitCode::from(parse_error_exit_code(&e));
        }
    };

    init_logging(cli.verbose);

    if cli.list_ports {
        print_ports();
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => report_error(&e),
    }
}

/// Exit code for a failed parse; `--help` and `--version` also arrive as errors
fn parse_error_exit_code(e: &clap::Error) -> u8 {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit::SUCCESS,
        _ => exit::INVALID_ARGUMENTS,
    }
}

fn run(cli: &Cli) -> Result<u8> {
    // Both are present unless --list-ports was given
    let (Some(device), Some(position)) = (cli.device.as_deref(), cli.position) else {
        anyhow::bail!("device and position are required");
    };

    let settings = cli.serial.settings()?;
    let command = Command::new(position, cli.duration_ms)?;

    let mut transport = open_device(device, &settings)?;
    let outcome = CommandSession::new(&mut transport, command)
        .per_read_timeout(settings.per_read_timeout())
        .run()?;

    if cli.json {
        let report = Report {
            device,
            command: &command,
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", outcome);
    }

    Ok(outcome.exit_code())
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}  [{:04x}:{:04x}] {} {}",
                port.name,
                vid,
                pid,
                port.manufacturer.as_deref().unwrap_or(""),
                port.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.name),
        }
    }
}
