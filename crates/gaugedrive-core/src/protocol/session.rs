//! Command session
//!
//! Runs one command exchange as an explicit state machine:
//!
//! ```text
//! Sending ──write ok──▶ AwaitingResponse ──line──▶ Finished(Acknowledged | Unrecognized)
//!                              │
//!                              └──deadline──▶ Finished(TimedOut)
//! ```
//!
//! The deadline is fixed once, on entry to `AwaitingResponse`. Reads are
//! bounded by the per-read timeout so the deadline is re-checked at least once
//! per read interval, and the session returns as soon as any reply arrives.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    classify, compute_window, Clock, Command, Outcome, ProtocolError, SystemClock, Transport,
    PER_READ_TIMEOUT_MS,
};

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Command not yet written
    Sending,
    /// Command written, polling for a reply
    AwaitingResponse {
        /// When the command was written
        sent_at: Instant,
        /// Point after which no more reads are attempted
        deadline: Instant,
        /// Window the deadline was derived from
        window: Duration,
    },
    /// Exchange complete
    Finished(Outcome),
}

/// One command exchange over an exclusively borrowed transport
///
/// A session is single use: build a new one for every command. No state is
/// carried between sessions.
pub struct CommandSession<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    command: Command,
    per_read_timeout: Duration,
    state: SessionState,
}

impl<T: Transport> CommandSession<T, SystemClock> {
    /// Create a session using the wall clock
    pub fn new(transport: T, command: Command) -> Self {
        Self::with_clock(transport, command, SystemClock)
    }
}

impl<T: Transport, C: Clock> CommandSession<T, C> {
    /// Create a session reading time from `clock`
    pub fn with_clock(transport: T, command: Command, clock: C) -> Self {
        Self {
            transport,
            clock,
            command,
            per_read_timeout: Duration::from_millis(PER_READ_TIMEOUT_MS),
            state: SessionState::Sending,
        }
    }

    /// Override the timeout of each individual read
    pub fn per_read_timeout(mut self, timeout: Duration) -> Self {
        self.per_read_timeout = timeout;
        self
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Command this session sends
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Advance the state machine by one transition
    ///
    /// Returns the outcome once the session has finished. Transport errors
    /// end the session immediately and are not retried.
    pub fn step(&mut self) -> Result<Option<Outcome>, ProtocolError> {
        match self.state {
            SessionState::Sending => {
                self.transport.discard_input()?;

                let line = self.command.to_wire();
                debug!("Sending {:?}", line.as_str());
                self.transport.write_line(&line)?;

                let window = compute_window(self.command.duration_ms());
                let sent_at = self.clock.now();
                debug!("Waiting up to {}s for a response", window.as_secs());
                self.state = SessionState::AwaitingResponse {
                    sent_at,
                    deadline: sent_at + window,
                    window,
                };
                Ok(None)
            }
            SessionState::AwaitingResponse {
                sent_at,
                deadline,
                window,
            } => {
                let raw = self.transport.read_line(self.per_read_timeout)?;
                let now = self.clock.now();

                let outcome = match classify(&raw) {
                    Some(outcome) => outcome,
                    None if now >= deadline => Outcome::TimedOut {
                        elapsed: now.saturating_duration_since(sent_at),
                        window,
                    },
                    None => return Ok(None),
                };

                match &outcome {
                    Outcome::Acknowledged(payload) => info!(
                        "Acknowledged after {:?}: {}",
                        now.saturating_duration_since(sent_at),
                        payload
                    ),
                    Outcome::Unrecognized(payload) => warn!("Device replied: {}", payload),
                    Outcome::TimedOut { elapsed, .. } => {
                        warn!("No response within {}s ({:?} elapsed)", window.as_secs(), elapsed)
                    }
                }
                self.state = SessionState::Finished(outcome.clone());
                Ok(Some(outcome))
            }
            SessionState::Finished(ref outcome) => Ok(Some(outcome.clone())),
        }
    }

    /// Run the exchange to completion
    pub fn run(mut self) -> Result<Outcome, ProtocolError> {
        info!("Moving needle: {}", self.command);
        loop {
            if let Some(outcome) = self.step()? {
                return Ok(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::clock::ManualClock;
    use crate::protocol::WireLine;
    use std::collections::VecDeque;

    /// Transport that replays scripted reads against a manual clock
    struct Scripted<'a> {
        clock: &'a ManualClock,
        /// (delay before the line is available, line)
        replies: VecDeque<(Duration, String)>,
        written: Vec<String>,
        fail_write: bool,
    }

    impl<'a> Scripted<'a> {
        fn new(clock: &'a ManualClock) -> Self {
            Self {
                clock,
                replies: VecDeque::new(),
                written: Vec::new(),
                fail_write: false,
            }
        }

        fn reply_after(mut self, delay: Duration, line: &str) -> Self {
            self.replies.push_back((delay, line.to_string()));
            self
        }
    }

    impl Transport for Scripted<'_> {
        fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError> {
            if self.fail_write {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged").into());
            }
            self.written.push(line.as_str().to_string());
            Ok(())
        }

        fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
            let Some((delay, _)) = self.replies.front() else {
                self.clock.advance(timeout);
                return Ok(String::new());
            };
            if *delay <= timeout {
                let (delay, line) = self.replies.pop_front().unwrap();
                self.clock.advance(delay);
                Ok(line)
            } else {
                self.replies[0].0 -= timeout;
                self.clock.advance(timeout);
                Ok(String::new())
            }
        }
    }

    fn command(position: u32, duration_ms: u32) -> Command {
        Command::new(position, duration_ms).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let clock = ManualClock::new();
        let mut transport = Scripted::new(&clock).reply_after(Duration::from_millis(100), "ACK.\n");
        let mut session = CommandSession::with_clock(&mut transport, command(10, 0), &clock);

        assert_eq!(session.state(), &SessionState::Sending);
        assert_eq!(session.step().unwrap(), None);
        match session.state() {
            SessionState::AwaitingResponse {
                sent_at,
                deadline,
                window,
            } => {
                assert_eq!(*window, Duration::from_secs(1));
                assert_eq!(*deadline - *sent_at, Duration::from_secs(1));
            }
            other => panic!("unexpected state {:?}", other),
        }

        let outcome = session.step().unwrap();
        assert_eq!(outcome, Some(Outcome::Acknowledged("ACK.".into())));
        assert!(matches!(session.state(), SessionState::Finished(_)));
        // Finished is terminal
        assert_eq!(session.step().unwrap(), outcome);

        assert_eq!(transport.written, vec!["10,0\n".to_string()]);
    }

    #[test]
    fn test_timeout_after_window() {
        let clock = ManualClock::new();
        let mut transport = Scripted::new(&clock);
        let outcome = CommandSession::with_clock(&mut transport, command(50, 1500), &clock)
            .run()
            .unwrap();

        match outcome {
            Outcome::TimedOut { elapsed, window } => {
                assert_eq!(window, Duration::from_secs(3));
                assert!(elapsed >= window);
                assert!(elapsed <= window + Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_do_not_end_the_wait() {
        let clock = ManualClock::new();
        let mut transport = Scripted::new(&clock)
            .reply_after(Duration::from_millis(10), "\r\n")
            .reply_after(Duration::from_millis(10), "   \n")
            .reply_after(Duration::from_millis(500), "ERR.busy\n");
        let outcome = CommandSession::with_clock(&mut transport, command(1, 0), &clock)
            .run()
            .unwrap();
        assert_eq!(outcome, Outcome::Unrecognized("ERR.busy".into()));
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let clock = ManualClock::new();
        let mut transport = Scripted::new(&clock);
        transport.fail_write = true;
        let result = CommandSession::with_clock(&mut transport, command(1, 0), &clock).run();
        assert!(matches!(result, Err(ProtocolError::IoError(_))));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
