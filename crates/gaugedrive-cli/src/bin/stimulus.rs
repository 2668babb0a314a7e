//! gaugedrive-stimulus - exercise a gauge with random movements
//!
//! Keeps one port open and sends a stream of random positions and transition
//! times, printing every command and the device reply. Useful for soak testing
//! a board and its firmware.

use anyhow::{ensure, Result};
use clap::Parser;
use gaugedrive_cli::{exit, init_logging, open_device, report_error, SerialArgs};
use gaugedrive_core::protocol::{Command, CommandSession, Outcome, MAX_DURATION_MS, MAX_POSITION};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "gaugedrive-stimulus", version, about = "Drive a gauge with random movements")]
struct Args {
    /// Serial port the gauge is attached to ("demo" for a simulated gauge)
    device: String,

    /// Stop after this many commands (runs until interrupted otherwise)
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Seed for a reproducible sequence
    #[arg(long)]
    seed: Option<u64>,

    /// Shortest transition time in milliseconds
    #[arg(long, default_value_t = 200)]
    min_duration_ms: u32,

    /// Longest transition time in milliseconds
    #[arg(long, default_value_t = 1000)]
    max_duration_ms: u32,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    serial: SerialArgs,
}

/// Running totals per outcome kind
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    acknowledged: u64,
    unrecognized: u64,
    timed_out: u64,
}

impl Tally {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Acknowledged(_) => self.acknowledged += 1,
            Outcome::Unrecognized(_) => self.unrecognized += 1,
            Outcome::TimedOut { .. } => self.timed_out += 1,
        }
    }

    fn total(&self) -> u64 {
        self.acknowledged + self.unrecognized + self.timed_out
    }

    fn exit_code(&self) -> u8 {
        if self.timed_out > 0 {
            exit::TIMEOUT
        } else if self.unrecognized > 0 {
            exit::DEVICE_ERROR
        } else {
            exit::SUCCESS
        }
    }
}

/// Random command generator
struct Stimulus {
    rng: StdRng,
    min_duration_ms: u32,
    max_duration_ms: u32,
}

impl Stimulus {
    fn new(seed: Option<u64>, min_duration_ms: u32, max_duration_ms: u32) -> Result<Self> {
        ensure!(
            min_duration_ms <= max_duration_ms,
            "--min-duration-ms ({}) is greater than --max-duration-ms ({})",
            min_duration_ms,
            max_duration_ms
        );
        ensure!(
            max_duration_ms <= MAX_DURATION_MS as u32,
            "--max-duration-ms must be at most {}",
            MAX_DURATION_MS
        );
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            min_duration_ms,
            max_duration_ms,
        })
    }

    fn next_command(&mut self) -> Result<Command> {
        let position = self.rng.gen_range(0..=MAX_POSITION as u32);
        let duration = self.rng.gen_range(self.min_duration_ms..=self.max_duration_ms);
        Ok(Command::new(position, duration)?)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => report_error(&e),
    }
}

fn run(args: &Args) -> Result<u8> {
    let settings = args.serial.settings()?;
    let mut stimulus = Stimulus::new(args.seed, args.min_duration_ms, args.max_duration_ms)?;
    let mut transport = open_device(&args.device, &settings)?;
    let mut tally = Tally::default();

    while args.count.map_or(true, |n| tally.total() < n) {
        let command = stimulus.next_command()?;
        println!(
            "value: {}, transition time: {}",
            command.position(),
            command.duration_ms()
        );

        let outcome = CommandSession::new(&mut transport, command)
            .per_read_timeout(settings.per_read_timeout())
            .run()?;
        println!("{}", outcome);
        tally.record(&outcome);
    }

    println!(
        "{} commands: {} acknowledged, {} errors, {} timeouts",
        tally.total(),
        tally.acknowledged,
        tally.unrecognized,
        tally.timed_out
    );
    Ok(tally.exit_code())
}
