//! Append-only log file standing in for the SD card.
//!
//! A session exists between [`SdCard::init_sd_card`] and
//! [`SdCard::close_sd_card`]. Dropping the card closes any open session.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::frame::ChannelLayout;
use crate::report::ascii_record;

struct Session {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

/// Scoped log file for measurement records.
#[derive(Default)]
pub struct SdCard {
    session: Option<Session>,
    layout: ChannelLayout,
}

impl SdCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: ChannelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Open `path` for appending, creating it if needed.
    ///
    /// Returns whether a session is now available. A session that is already
    /// open is closed first.
    pub fn init_sd_card<P: AsRef<Path>>(&mut self, path: P) -> bool {
        self.close_sd_card();
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                info!(path = %path.display(), "SD card log opened");
                self.session = Some(Session {
                    path: path.to_path_buf(),
                    writer: BufWriter::new(file),
                    records: 0,
                });
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "SD card log unavailable");
                false
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Append one timestamped record decoded from `buffer[..size]`.
    pub fn print_to_sd_card(&mut self, buffer: &[u8], size: usize) -> Result<(), StorageError> {
        let session = self.session.as_mut().ok_or(StorageError::NotOpen)?;
        let record = ascii_record(buffer, size, &self.layout)?;
        writeln!(
            session.writer,
            "{}\t{}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            record
        )?;
        session.records += 1;
        Ok(())
    }

    /// Flush and release the session. Does nothing when none is open.
    pub fn close_sd_card(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.writer.flush() {
                warn!(path = %session.path.display(), error = %e, "SD card flush failed");
            }
            info!(
                path = %session.path.display(),
                records = session.records,
                "SD card log closed"
            );
        }
    }
}

impl Drop for SdCard {
    fn drop(&mut self) {
        self.close_sd_card();
    }
}
