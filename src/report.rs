//! Rendering measurement buffers onto a serial stream.

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ReportError;
use crate::frame::{ChannelLayout, Frame};

/// Marks the start of a binary packet on the wire.
pub const PACKET_HEADER: [u8; 5] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE];

/// Raw dump formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Binary,
    Hexadecimal,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Format::Binary),
            "hexadecimal" | "hex" => Ok(Format::Hexadecimal),
            other => Err(format!("unknown raw format '{}'", other)),
        }
    }
}

/// Writes buffers to a byte stream, usually a serial port.
pub struct Reporter<W> {
    out: W,
    layout: ChannelLayout,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            layout: ChannelLayout::default(),
        }
    }

    /// Channels and encodings used by [`Reporter::print_ascii_data`].
    pub fn with_layout(mut self, layout: ChannelLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Emit the first `size` bytes of `buffer` without interpreting them.
    pub fn print_raw_data(&mut self, buffer: &[u8], format: Format, size: usize) -> Result<(), ReportError> {
        let bytes = prefix(buffer, size)?;
        match format {
            Format::Binary => {
                self.out.write_all(&PACKET_HEADER)?;
                self.out.write_all(bytes)?;
            }
            Format::Hexadecimal => {
                let mut line = hex_string(bytes);
                line.push('\n');
                self.out.write_all(line.as_bytes())?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Print the buffer as one line of decimal fields.
    pub fn print_ascii_data(&mut self, buffer: &[u8], size: usize) -> Result<(), ReportError> {
        let mut line = ascii_record(buffer, size, &self.layout)?;
        line.push('\n');
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    /// Report how long a batch of readings took.
    pub fn print_timing(&mut self, elapsed: Duration, readings: usize) -> Result<(), ReportError> {
        let per_reading = if readings == 0 {
            0.0
        } else {
            elapsed.as_secs_f64() * 1000.0 / readings as f64
        };
        writeln!(
            self.out,
            "Time taken for {} readings: {:.3} ms ({:.3} ms per reading)",
            readings,
            elapsed.as_secs_f64() * 1000.0,
            per_reading
        )?;
        self.out.flush()?;
        Ok(())
    }
}

fn prefix(buffer: &[u8], size: usize) -> Result<&[u8], ReportError> {
    buffer.get(..size).ok_or(ReportError::SizeOutOfRange {
        size,
        len: buffer.len(),
    })
}

/// Two uppercase hex characters per byte, no separators.
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Decode `buffer[..size]` into tab-separated decimal fields.
///
/// The header status comes first, then for every node its status followed by
/// its samples. A sample that only kept its high byte is suffixed with `~`.
pub fn ascii_record(buffer: &[u8], size: usize, layout: &ChannelLayout) -> Result<String, ReportError> {
    let frame = Frame::decode(prefix(buffer, size)?)?;
    let mut fields = vec![frame.status().to_string()];
    for reading in &frame.readings {
        fields.push(reading.status.to_string());
        for sample in reading.samples(layout) {
            if sample.partial {
                fields.push(format!("{}~", sample.value));
            } else {
                fields.push(sample.value.to_string());
            }
        }
    }
    Ok(fields.join("\t"))
}
