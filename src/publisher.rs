//! Publisher abstraction for measurement buffers.
//!
//! This module defines the Publisher trait and the concrete sinks a scan can
//! be fanned out to (serial stream, SD card log, tracing log).

use std::io::Write;

use serde::Deserialize;
use tracing::{trace, warn};

use crate::error::{Result, StorageError};
use crate::frame::MeasurementBuffer;
use crate::report::{Format, Reporter, hex_string};
use crate::storage::SdCard;

/// How the serial publisher renders a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Binary,
    Hexadecimal,
    Ascii,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(OutputFormat::Ascii),
            other => other.parse::<Format>().map(|format| match format {
                Format::Binary => OutputFormat::Binary,
                Format::Hexadecimal => OutputFormat::Hexadecimal,
            }),
        }
    }
}

/// Trait for publishing measurement buffers
pub trait Publisher {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Publish one completed scan
    fn publish(&mut self, buffer: &MeasurementBuffer) -> Result<()>;
}

/// Serial stream publisher
pub struct SerialPublisher<W> {
    reporter: Reporter<W>,
    format: OutputFormat,
}

impl<W: Write> SerialPublisher<W> {
    pub fn new(reporter: Reporter<W>, format: OutputFormat) -> Self {
        Self { reporter, format }
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter<W> {
        &mut self.reporter
    }

    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }
}

impl<W: Write> Publisher for SerialPublisher<W> {
    fn name(&self) -> &str {
        "serial"
    }

    fn publish(&mut self, buffer: &MeasurementBuffer) -> Result<()> {
        let bytes = buffer.as_bytes();
        match self.format {
            OutputFormat::Binary => self.reporter.print_raw_data(bytes, Format::Binary, bytes.len())?,
            OutputFormat::Hexadecimal => {
                self.reporter
                    .print_raw_data(bytes, Format::Hexadecimal, bytes.len())?
            }
            OutputFormat::Ascii => self.reporter.print_ascii_data(bytes, bytes.len())?,
        }
        Ok(())
    }
}

/// SD card publisher
///
/// Records are dropped while no session is open; the first such drop is
/// logged.
pub struct SdCardPublisher {
    card: SdCard,
    warned: bool,
}

impl SdCardPublisher {
    pub fn new(card: SdCard) -> Self {
        Self { card, warned: false }
    }

    pub fn card_mut(&mut self) -> &mut SdCard {
        &mut self.card
    }
}

impl Publisher for SdCardPublisher {
    fn name(&self) -> &str {
        "sd-card"
    }

    fn publish(&mut self, buffer: &MeasurementBuffer) -> Result<()> {
        match self.card.print_to_sd_card(buffer.as_bytes(), buffer.len()) {
            Ok(()) => {
                self.warned = false;
                Ok(())
            }
            Err(StorageError::NotOpen) => {
                if !self.warned {
                    warn!("SD card session not open, records are not being logged");
                    self.warned = true;
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Logging publisher that traces buffers instead of publishing
pub struct LoggingPublisher;

impl Publisher for LoggingPublisher {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&mut self, buffer: &MeasurementBuffer) -> Result<()> {
        trace!(
            topology = %buffer.topology(),
            status = buffer.status(),
            data = %hex_string(buffer.as_bytes()),
            "scan"
        );
        Ok(())
    }
}

/// No-op publisher for testing or when every output is disabled
pub struct NoOpPublisher;

impl Publisher for NoOpPublisher {
    fn name(&self) -> &str {
        "noop"
    }

    fn publish(&mut self, _buffer: &MeasurementBuffer) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::Topology;
    use crate::report::PACKET_HEADER;

    #[test]
    fn test_noop_publisher() {
        let mut publisher = NoOpPublisher;
        let buffer = MeasurementBuffer::new(Topology::Four);
        assert!(publisher.publish(&buffer).is_ok());
        assert_eq!(publisher.name(), "noop");
    }

    #[test]
    fn test_logging_publisher() {
        let mut publisher = LoggingPublisher;
        let buffer = MeasurementBuffer::new(Topology::Sixteen);
        assert!(publisher.publish(&buffer).is_ok());
    }

    #[test]
    fn test_serial_publisher_binary() {
        let buffer = MeasurementBuffer::new(Topology::Four);
        let mut publisher = SerialPublisher::new(Reporter::new(Vec::new()), OutputFormat::Binary);
        publisher.publish(&buffer).unwrap();

        let out = publisher.into_reporter().into_inner();
        assert_eq!(&out[..5], &PACKET_HEADER);
        assert_eq!(out.len(), 5 + 26);
    }

    #[test]
    fn test_serial_publisher_ascii() {
        let buffer = MeasurementBuffer::new(Topology::Single);
        let mut publisher = SerialPublisher::new(Reporter::new(Vec::new()), OutputFormat::Ascii);
        publisher.publish(&buffer).unwrap();

        let out = publisher.into_reporter().into_inner();
        assert_eq!(out, b"0\t0\t0\t0\t0~\n");
    }

    #[test]
    fn test_sd_publisher_without_session_is_not_fatal() {
        let mut publisher = SdCardPublisher::new(SdCard::new());
        let buffer = MeasurementBuffer::new(Topology::Four);
        assert!(publisher.publish(&buffer).is_ok());
        assert!(publisher.publish(&buffer).is_ok());
    }

    #[test]
    fn test_sd_publisher_writes_when_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut publisher = SdCardPublisher::new(SdCard::new());
        assert!(publisher.card_mut().init_sd_card(&path));

        let buffer = MeasurementBuffer::new(Topology::Four);
        publisher.publish(&buffer).unwrap();
        publisher.card_mut().close_sd_card();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("ascii".parse::<OutputFormat>().unwrap(), OutputFormat::Ascii);
        assert_eq!("hex".parse::<OutputFormat>().unwrap(), OutputFormat::Hexadecimal);
        assert!("json".parse::<OutputFormat>().is_err());
    }
}
