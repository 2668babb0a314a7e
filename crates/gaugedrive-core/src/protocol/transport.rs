//! Line-oriented transport
//!
//! The session talks to the device through [`Transport`]; [`SerialTransport`]
//! is the real implementation on top of `serialport`.

use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::{serial::open_port, ProtocolError, SerialSettings, WireLine};

/// Byte-level link to the gauge
pub trait Transport {
    /// Write a command line exactly as given
    fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError>;

    /// Block up to `timeout` for one newline-terminated line
    ///
    /// Returns the line including its terminator, or an empty string if no
    /// complete line arrived in time. Bytes of an unfinished line are kept and
    /// completed by a later call.
    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError>;

    /// Drop any input the device sent before now
    fn discard_input(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        (**self).read_line(timeout)
    }

    fn discard_input(&mut self) -> Result<(), ProtocolError> {
        (**self).discard_input()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        (**self).read_line(timeout)
    }

    fn discard_input(&mut self) -> Result<(), ProtocolError> {
        (**self).discard_input()
    }
}

/// Serial port transport
///
/// Owns the port handle; dropping the transport closes the device on every
/// exit path.
pub struct SerialTransport {
    /// Serial port handle
    port: Box<dyn SerialPort>,
    /// Device path, for log messages
    name: String,
    /// Bytes received but not yet returned as a complete line
    pending: Vec<u8>,
    /// Timeout currently programmed into the port
    port_timeout: Duration,
}

impl SerialTransport {
    /// Open and configure the device at `path`
    pub fn open(path: &str, settings: &SerialSettings) -> Result<Self, ProtocolError> {
        let port = open_port(path, settings)?;
        debug!(
            "Opened {} at {} baud ({}{}{}, rts_cts={}, dtr_dsr={})",
            path,
            settings.baud_rate,
            settings.data_bits,
            settings.parity.letter(),
            settings.stop_bits,
            settings.flow_control.rts_cts,
            settings.flow_control.dtr_dsr,
        );
        Ok(Self::from_port(port, path))
    }

    /// Wrap a port that is already open and configured
    pub fn from_port(port: Box<dyn SerialPort>, name: &str) -> Self {
        let port_timeout = port.timeout();
        Self {
            port,
            name: name.to_string(),
            pending: Vec::new(),
            port_timeout,
        }
    }

    /// Device path this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove and return the first complete line in the pending buffer
    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn set_port_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        if timeout != self.port_timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
            self.port_timeout = timeout;
        }
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &WireLine) -> Result<(), ProtocolError> {
        trace!("{} <- {:?}", self.name, line.as_str());
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        if let Some(line) = self.take_line() {
            return Ok(line);
        }

        let start = Instant::now();
        let mut buffer = [0u8; 64];

        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            self.set_port_timeout(remaining)?;

            match self.port.read(&mut buffer) {
                Ok(0) => {
                    return Err(ProtocolError::IoError(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("{} closed", self.name),
                    )));
                }
                Ok(n) => {
                    trace!("{} -> {:?}", self.name, String::from_utf8_lossy(&buffer[..n]));
                    self.pending.extend_from_slice(&buffer[..n]);
                    if let Some(line) = self.take_line() {
                        return Ok(line);
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        // Timed out; an unfinished line stays pending for the next read
        if !self.pending.is_empty() {
            trace!("{} holding {} bytes of an unfinished line", self.name, self.pending.len());
        }
        Ok(String::new())
    }

    fn discard_input(&mut self) -> Result<(), ProtocolError> {
        if !self.pending.is_empty() {
            debug!("Discarding {} buffered bytes from {}", self.pending.len(), self.name);
            self.pending.clear();
        }
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!("Closing {}", self.name);
    }
}
