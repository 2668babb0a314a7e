//! Demo Mode - Simulated gauge for running without hardware
//!
//! Behaves like the gauge firmware on the other end of the serial link: it
//! parses each command line, moves a virtual needle and acknowledges once the
//! transition has finished. A command for the position the needle is already
//! at is acknowledged straight away.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::protocol::clock::ManualClock;
use crate::protocol::{decode, Clock, ProtocolError, Transport, WireLine};

/// Where the simulator gets its time from
enum DemoTime {
    /// Wall clock; reads really block
    Real,
    /// Shared manual clock; reads advance it instead of sleeping
    Manual(Rc<ManualClock>),
}

impl DemoTime {
    fn now(&self) -> Instant {
        match self {
            DemoTime::Real => Instant::now(),
            DemoTime::Manual(clock) => clock.now(),
        }
    }

    fn wait(&self, d: Duration) {
        match self {
            DemoTime::Real => std::thread::sleep(d),
            DemoTime::Manual(clock) => clock.advance(d),
        }
    }
}

/// Simulated gauge implementing [`Transport`]
pub struct DemoGauge {
    /// Current needle position
    position: u8,
    /// Reply that becomes readable at the given instant
    reply: Option<(Instant, String)>,
    time: DemoTime,
    /// Random extra processing latency
    rng: StdRng,
    max_jitter: Duration,
    /// When false the gauge swallows commands without replying
    responsive: bool,
}

impl Default for DemoGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoGauge {
    /// Create a simulator running on the wall clock
    pub fn new() -> Self {
        Self {
            position: 0,
            reply: None,
            time: DemoTime::Real,
            rng: StdRng::from_entropy(),
            max_jitter: Duration::from_millis(20),
            responsive: true,
        }
    }

    /// Create a simulator whose time is driven by `clock`
    ///
    /// No latency jitter is added so results are deterministic.
    pub fn with_manual_clock(clock: Rc<ManualClock>) -> Self {
        Self {
            time: DemoTime::Manual(clock),
            max_jitter: Duration::ZERO,
            ..Self::new()
        }
    }

    /// Seed the latency generator
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Maximum random latency added to each reply
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Make the gauge ignore every command
    pub fn unresponsive(mut self) -> Self {
        self.responsive = false;
        self
    }

    /// Start the needle at `position`
    pub fn at_position(mut self, position: u8) -> Self {
        self.position = position;
        self
    }

    /// Current needle position
    pub fn position(&self) -> u8 {
        self.position
    }

    fn jitter(&mut self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max = self.max_jitter.as_millis() as u64;
        Duration::from_millis(self.rng.gen_range(0..=max))
    }
}

impl Transport for DemoGauge {
    fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError> {
        if !self.responsive {
            debug!("demo gauge ignoring {:?}", line.as_str());
            return Ok(());
        }

        let now = self.time.now();
        let jitter = self.jitter();
        self.reply = Some(match decode(line.as_str()) {
            Ok(cmd) if cmd.position() == self.position => (now + jitter, "ACK.\n".to_string()),
            Ok(cmd) => {
                self.position = cmd.position();
                let transition = Duration::from_millis(u64::from(cmd.duration_ms()));
                (now + transition + jitter, "ACK.\n".to_string())
            }
            Err(e) => (now + jitter, format!("ERR.{}\n", e)),
        });
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        let now = self.time.now();
        let ready_at = self.reply.as_ref().map(|(at, _)| *at);
        match ready_at {
            Some(at) if at <= now + timeout => {
                self.time.wait(at.saturating_duration_since(now));
                Ok(self.reply.take().map(|(_, line)| line).unwrap_or_default())
            }
            _ => {
                self.time.wait(timeout);
                Ok(String::new())
            }
        }
    }

    fn discard_input(&mut self) -> Result<(), ProtocolError> {
        let now = self.time.now();
        if matches!(&self.reply, Some((ready_at, _)) if *ready_at <= now) {
            debug!("demo gauge dropping stale reply");
            self.reply = None;
        }
        Ok(())
    }
}
