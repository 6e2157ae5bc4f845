//! Acquisition library for arrays of MLX90393 magnetic sensors.
//!
//! Nodes are addressed four at a time on an I2C line; larger arrays put a 1-of-4
//! multiplexer in front of each line and spread over several lines. Every scan
//! refills a fixed-layout [`MeasurementBuffer`] that can be streamed as raw
//! bytes, hexadecimal or decoded text, or logged to an SD card file.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod publisher;
pub mod report;
pub mod sensors;
pub mod service;
pub mod storage;

#[cfg(test)]
mod testing;

pub use acquisition::{AcquisitionEngine, AddressPackage, Addressing, MuxSelector, Topology};
pub use error::{AppError, Result};
pub use frame::{Frame, MeasurementBuffer};
pub use report::{Format, Reporter};
pub use sensors::{AxisMask, MagTransport, SensorSettings};
pub use storage::SdCard;
