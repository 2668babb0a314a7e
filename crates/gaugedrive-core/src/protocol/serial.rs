//! Serial port handling
//!
//! Provides port discovery and the explicit settings used to open the link
//! to the gauge.

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ProtocolError, DEFAULT_BAUD_RATE, PER_READ_TIMEOUT_MS};

/// Parity setting, mirrored so it can be stored in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl Parity {
    /// Conventional letter used in "8N1"-style notation
    pub fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Flow control lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlSettings {
    /// RTS/CTS hardware handshake
    pub rts_cts: bool,
    /// Assert DTR (DTR/DSR handshake); also keeps Arduino boards from resetting
    pub dtr_dsr: bool,
}

impl Default for FlowControlSettings {
    fn default() -> Self {
        Self {
            rts_cts: true,
            dtr_dsr: true,
        }
    }
}

/// Settings used to open the serial link
///
/// Defaults match the gauge firmware: 9600 baud, 8N1, hardware flow control,
/// XON/XOFF off and a one second read timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character (5-8)
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Flow control lines
    pub flow_control: FlowControlSettings,
    /// Timeout of a single blocking read, in milliseconds
    pub per_read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControlSettings::default(),
            per_read_timeout_ms: PER_READ_TIMEOUT_MS,
        }
    }
}

impl SerialSettings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content).map_err(|e| {
            ProtocolError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that every field maps onto a real port setting
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.baud_rate == 0 {
            return Err(ProtocolError::ConfigError("baud_rate must be non-zero".into()));
        }
        self.serial_data_bits()?;
        self.serial_stop_bits()?;
        if self.per_read_timeout_ms == 0 {
            return Err(ProtocolError::ConfigError(
                "per_read_timeout_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Timeout of a single blocking read
    pub fn per_read_timeout(&self) -> Duration {
        Duration::from_millis(self.per_read_timeout_ms)
    }

    fn serial_data_bits(&self) -> Result<serialport::DataBits, ProtocolError> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            n => Err(ProtocolError::ConfigError(format!("unsupported data bits: {}", n))),
        }
    }

    fn serial_stop_bits(&self) -> Result<serialport::StopBits, ProtocolError> {
        match self.stop_bits {
            1 => Ok(serialport::StopBits::One),
            2 => Ok(serialport::StopBits::Two),
            n => Err(ProtocolError::ConfigError(format!("unsupported stop bits: {}", n))),
        }
    }

    fn serial_flow_control(&self) -> serialport::FlowControl {
        // XON/XOFF is never enabled
        if self.flow_control.rts_cts {
            serialport::FlowControl::Hardware
        } else {
            serialport::FlowControl::None
        }
    }
}

/// Information about an available serial port
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key putting the ports a microcontroller board usually shows up on first:
///  - ttyACM* (native USB boards), numerically
///  - ttyUSB* (USB-serial adapters), numerically
///  - macOS cu./tty.usbserial* and cu./tty.usbmodem*
///  - everything else by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    let mac = basename
        .strip_prefix("cu.")
        .or_else(|| basename.strip_prefix("tty."))
        .unwrap_or("");
    if mac.starts_with("usbserial") || mac.starts_with("usbmodem") {
        return (2, 0, basename.to_string());
    }
    (3, 0, basename.to_string())
}

/// List available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => warn!("Port enumeration failed: {}", e),
    }

    // Linux-only: some USB CDC devices are not reported by the enumeration API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open and configure a serial port
pub(crate) fn open_port(
    name: &str,
    settings: &SerialSettings,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    settings.validate()?;

    let mut port = serialport::new(name, settings.baud_rate)
        .data_bits(settings.serial_data_bits()?)
        .parity(settings.parity.into())
        .stop_bits(settings.serial_stop_bits()?)
        .flow_control(settings.serial_flow_control())
        .timeout(settings.per_read_timeout())
        .open()
        .map_err(|e| ProtocolError::ConnectionFailed(format!("{}: {}", name, e)))?;

    configure_lines(port.as_mut(), settings)?;
    Ok(port)
}

/// Drive the modem control lines
fn configure_lines(port: &mut dyn SerialPort, settings: &SerialSettings) -> Result<(), ProtocolError> {
    if settings.flow_control.dtr_dsr {
        port.write_data_terminal_ready(true)
            .map_err(|e| ProtocolError::ConnectionFailed(format!("failed to assert DTR: {}", e)))?;
        debug!("DTR asserted");
    }

    if settings.flow_control.rts_cts {
        // Some USB-serial drivers reject explicit RTS control under hardware
        // flow control; the driver manages it then.
        match port.write_request_to_send(true) {
            Ok(()) => debug!("RTS asserted"),
            Err(e) => debug!("RTS left to driver: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_ports() {
        // Only checks that enumeration does not panic on this host
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/cu.usbserial-AM01QKUP",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyACM10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo::bare(n.to_string()))
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/cu.usbserial-AM01QKUP",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_default_settings_match_firmware() {
        let s = SerialSettings::default();
        assert_eq!(s.baud_rate, 9600);
        assert_eq!(s.data_bits, 8);
        assert_eq!(s.parity, Parity::None);
        assert_eq!(s.stop_bits, 1);
        assert!(s.flow_control.rts_cts);
        assert!(s.flow_control.dtr_dsr);
        assert_eq!(s.per_read_timeout(), Duration::from_secs(1));
        assert_eq!(s.serial_flow_control(), serialport::FlowControl::Hardware);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unsupported_values() {
        let s = SerialSettings {
            data_bits: 9,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(ProtocolError::ConfigError(_))));

        let s = SerialSettings {
            stop_bits: 3,
            ..Default::default()
        };
        assert!(s.validate().is_err());

        let s = SerialSettings {
            baud_rate: 0,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_open_missing_device_is_connection_error() {
        let result = open_port("/dev/gaugedrive-does-not-exist", &SerialSettings::default());
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: SerialSettings =
            serde_json::from_str(r#"{"baud_rate": 115200, "flow_control": {"dtr_dsr": false}}"#)
                .unwrap();
        assert_eq!(s.baud_rate, 115200);
        assert_eq!(s.data_bits, 8);
        assert!(s.flow_control.rts_cts);
        assert!(!s.flow_control.dtr_dsr);
    }
}
