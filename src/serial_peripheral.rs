//! Remote controllers attached over a serial line, for example a BLE-UART
//! bridge or a microcontroller reading two joysticks. Each notification
//! payload arrives as one `\n`-terminated line.

use crate::peripheral::{Connection, DeviceInfo, Peripheral, PeripheralError};

use log::{debug, info};
use serial2::SerialPort;
use std::{
    collections::VecDeque,
    io,
    time::{Duration, Instant},
};

/// Lines longer than this without a newline are line noise, not payloads.
const MAX_LINE: usize = 1024;

/// A [`Peripheral`] that treats every serial port on the machine as a
/// candidate device.
#[derive(Debug, Clone)]
pub struct SerialPeripheral {
    baud_rate: u32,
}

impl SerialPeripheral {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl Peripheral for SerialPeripheral {
    fn scan(&mut self) -> Result<Vec<DeviceInfo>, PeripheralError> {
        let ports = SerialPort::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|path| DeviceInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned()),
                address: path.to_string_lossy().into_owned(),
            })
            .collect())
    }

    /// Opens the port and waits for the first complete line. A controller
    /// streams continuously, so silence for the whole `timeout` means there
    /// is nothing useful on the other end.
    fn connect(
        &mut self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, PeripheralError> {
        let port = SerialPort::open(address, self.baud_rate).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PeripheralError::NotFound(address.to_owned()),
            _ => PeripheralError::IoError(e),
        })?;
        info!("Opened {} at {} baud", address, self.baud_rate);

        let mut conn = SerialConnection {
            port,
            framer: LineFramer::default(),
        };
        if !conn.fill(timeout)? {
            return Err(PeripheralError::Timeout(timeout));
        }
        Ok(Box::new(conn))
    }
}

/// A live serial link.
pub struct SerialConnection {
    port: SerialPort,
    framer: LineFramer,
}

impl SerialConnection {
    /// Reads until at least one complete line is queued or `wait` runs out.
    /// Returns whether a line is available.
    fn fill(&mut self, wait: Duration) -> Result<bool, PeripheralError> {
        let deadline = Instant::now() + wait;
        let mut buffer = [0; 256];

        while !self.framer.has_lines() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.port.set_read_timeout(deadline - now)?;

            match self.port.read(&mut buffer) {
                Ok(0) => return Err(PeripheralError::Disconnected),
                Ok(read_len) => self.framer.push(&buffer[..read_len]),
                Err(e) if is_timeout(&e) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl Connection for SerialConnection {
    fn next_notification(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, PeripheralError> {
        if self.fill(wait)? {
            Ok(self.framer.pop())
        } else {
            Ok(None)
        }
    }

    fn disconnect(self: Box<Self>) -> Result<(), PeripheralError> {
        // Dropping the port closes it.
        Ok(())
    }
}

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Debug, Default)]
struct LineFramer {
    read_buf: Vec<u8>,
    lines: VecDeque<Vec<u8>>,
}

impl LineFramer {
    fn push(&mut self, bytes: &[u8]) {
        for &c in bytes {
            if c == b'\n' {
                self.lines.push_back(std::mem::take(&mut self.read_buf));
            } else {
                self.read_buf.push(c);
                // Often happens at the beginning of transmission when there
                // is still garbage in the hardware buffer
                if self.read_buf.len() > MAX_LINE {
                    debug!("Dropping {} bytes without a newline", self.read_buf.len());
                    self.read_buf.clear();
                }
            }
        }
    }

    fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    fn pop(&mut self) -> Option<Vec<u8>> {
        self.lines.pop_front()
    }
}
