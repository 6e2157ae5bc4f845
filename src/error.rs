//! Custom error types for the magarray crate.
//!
//! This module defines domain-specific error types using thiserror. Per-node bus
//! failures are absent here: they travel in-band as status bytes inside
//! the measurement buffer and never surface as an `Err`.

use thiserror::Error;

/// Errors raised by the acquisition engine for invalid calls.
///
/// All of these are programming errors (bad arguments or call order); none of
/// them is produced by a misbehaving sensor.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("I2C address 0x{address:02X} in slot {slot} is not a 7-bit address")]
    InvalidAddress { slot: usize, address: u8 },

    #[error("Unsupported topology: {0} nodes")]
    UnsupportedTopology(u32),

    #[error("Invalid axis mask 0x{0:02X}: expected a non-zero zyxt nibble")]
    InvalidAxisMask(u8),

    #[error("Device slot {0} has no bound address")]
    UnboundSlot(usize),

    #[error("Multiplexer group {0} out of range (0..=3)")]
    InvalidGroup(u8),

    #[error("{topology} needs {needed} I2C bus(es), only {available} available")]
    MissingBus {
        topology: String,
        needed: usize,
        available: usize,
    },

    #[error("{0} requires a multiplexer selector")]
    MissingMultiplexer(String),

    #[error("Acquisition engine not initialised for {0}")]
    NotInitialized(String),

    #[error("Buffer holds {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },

    #[error("Multiplexer select line failed: {0}")]
    Mux(String),
}

/// Errors related to rendering buffers onto the serial stream
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Serial write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Requested {size} bytes from a {len}-byte buffer")]
    SizeOutOfRange { size: usize, len: usize },

    #[error("No buffer layout is {0} bytes long")]
    UnknownLayout(usize),
}

/// Errors related to the SD card session
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SD card session is not open")]
    NotOpen,

    #[error("SD card write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to format record: {0}")]
    Format(#[from] ReportError),
}

/// Errors related to application configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors related to service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationError(String),

    #[error("Signal handling error: {0}")]
    SignalError(String),
}

/// Application-level errors that can wrap other error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_message() {
        let err = AcquisitionError::InvalidAddress {
            slot: 2,
            address: 0x8C,
        };
        assert_eq!(
            err.to_string(),
            "I2C address 0x8C in slot 2 is not a 7-bit address"
        );
    }

    #[test]
    fn test_wraps_into_app_error() {
        let err: AppError = StorageError::NotOpen.into();
        assert!(matches!(err, AppError::Storage(StorageError::NotOpen)));
        assert_eq!(err.to_string(), "Storage error: SD card session is not open");
    }
}
