use std::{fmt, time::Duration};

/// A peripheral found by [`Peripheral::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.address {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

/// Things that go wrong talking to a peripheral. None of these are fatal;
/// they end up on the status line.
#[derive(Debug)]
pub enum PeripheralError {
    IoError(std::io::Error),
    /// No device answers to that address.
    NotFound(String),
    /// The connection did not come up within the allowed wait.
    Timeout(Duration),
    /// The device went away while connected.
    Disconnected,
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeripheralError::IoError(e) => write!(f, "io error: {}", e),
            PeripheralError::NotFound(address) => write!(f, "no device at {}", address),
            PeripheralError::Timeout(wait) => {
                write!(f, "no answer within {:.1}s", wait.as_secs_f64())
            }
            PeripheralError::Disconnected => write!(f, "device disconnected"),
        }
    }
}

impl std::error::Error for PeripheralError {}

impl From<std::io::Error> for PeripheralError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

/// `Peripheral`
///
/// Something that can list the remote controllers in reach and open a
/// [`Connection`] to one of them. Implementations are driven from the
/// peripheral worker thread, never from the main loop.
pub trait Peripheral: Send {
    /// Lists the devices currently in reach.
    fn scan(&mut self) -> Result<Vec<DeviceInfo>, PeripheralError>;

    /// Opens a connection. Must give up and return
    /// [`PeripheralError::Timeout`] rather than wait longer than `timeout`.
    fn connect(
        &mut self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, PeripheralError>;
}

/// `Connection`
///
/// A live link to one peripheral, delivering raw notification payloads.
pub trait Connection: Send {
    /// Waits at most `wait` for the next payload. `Ok(None)` means nothing
    /// arrived in time.
    fn next_notification(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, PeripheralError>;

    /// Closes the link.
    fn disconnect(self: Box<Self>) -> Result<(), PeripheralError>;
}
