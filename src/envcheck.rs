//! A quick look at the machine we are running on, for bug reports and for
//! checking that a controller shows up before trying to fly with it.

use serial2::SerialPort;
use std::fmt;

/// What `droneknob check` prints.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvReport {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    /// Columns and rows, if stdout is a terminal.
    pub terminal: Option<(u16, u16)>,
    /// Serial ports, or why they could not be listed.
    pub serial_ports: Result<Vec<String>, String>,
}

impl EnvReport {
    pub fn collect() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            terminal: crossterm::terminal::size().ok(),
            serial_ports: SerialPort::available_ports()
                .map(|ports| {
                    ports
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect()
                })
                .map_err(|e| e.to_string()),
        }
    }

    /// A terminal smaller than this cannot fit the flight view.
    pub fn terminal_ok(&self) -> bool {
        matches!(self.terminal, Some((w, h)) if w >= 80 && h >= 24)
    }
}

impl fmt::Display for EnvReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "droneknob version: {}", self.version)?;
        writeln!(f, "System platform: {}-{}", self.os, self.arch)?;
        match self.terminal {
            Some((w, h)) => {
                let note = if self.terminal_ok() { "" } else { " (too small, need 80x24)" };
                writeln!(f, "Terminal size: {}x{}{}", w, h, note)?
            }
            None => writeln!(f, "Terminal size: not a terminal")?,
        }
        match &self.serial_ports {
            Ok(ports) if ports.is_empty() => writeln!(f, "Serial ports: none found"),
            Ok(ports) => {
                writeln!(f, "Serial ports:")?;
                for port in ports {
                    writeln!(f, "\t{}", port)?;
                }
                Ok(())
            }
            Err(e) => writeln!(f, "Serial ports: unavailable ({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_mentions_everything() {
        let report = EnvReport {
            version: "1.2.3",
            os: "linux",
            arch: "x86_64",
            terminal: Some((100, 30)),
            serial_ports: Ok(vec!["/dev/ttyUSB0".to_owned()]),
        };
        let text = report.to_string();
        assert!(text.contains("1.2.3"));
        assert!(text.contains("linux-x86_64"));
        assert!(text.contains("100x30\n"));
        assert!(text.contains("\t/dev/ttyUSB0"));
    }

    #[test]
    fn small_or_missing_terminals_are_flagged() {
        let mut report = EnvReport {
            version: "0.0.0",
            os: "linux",
            arch: "aarch64",
            terminal: Some((60, 20)),
            serial_ports: Err("permission denied".to_owned()),
        };
        assert!(!report.terminal_ok());
        assert!(report.to_string().contains("too small"));
        assert!(report.to_string().contains("unavailable (permission denied)"));

        report.terminal = None;
        assert!(!report.terminal_ok());
    }

    #[test]
    fn collect_fills_in_the_build_info() {
        let report = EnvReport::collect();
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(report.os, std::env::consts::OS);
    }
}
