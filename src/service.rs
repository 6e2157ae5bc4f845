//! Service layer for scanning the array and publishing buffers.
//!
//! The service owns the acquisition engine and the measurement buffer, runs
//! init once and then repeats read and publish until stopped.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use tracing::{debug, error, info};

use crate::acquisition::{AcquisitionEngine, Addressing, MuxSelector, Topology};
use crate::config::AppConfig;
use crate::error::{Result, ServiceError};
use crate::frame::MeasurementBuffer;
use crate::publisher::Publisher;
use crate::report::Reporter;
use crate::sensors::{MagTransport, SensorSettings};

/// Number of scans timed by [`AcquisitionService::benchmark`] by default.
pub const BENCHMARK_READINGS: usize = 1000;

/// Service state for scanning and publishing
pub struct AcquisitionService<T, P, D> {
    engine: AcquisitionEngine<T, P, D>,
    buffer: MeasurementBuffer,
    addressing: Addressing,
    zyxt: u8,
    settings: SensorSettings,
    mux: Option<MuxSelector<P, D>>,
    publishers: Vec<Box<dyn Publisher>>,
    should_stop: Arc<AtomicBool>,
}

impl<T, P, D> AcquisitionService<T, P, D>
where
    T: MagTransport,
    P: OutputPin,
    D: DelayNs,
{
    /// Create a new acquisition service
    pub fn new(
        engine: AcquisitionEngine<T, P, D>,
        topology: Topology,
        addressing: Addressing,
        zyxt: u8,
        settings: SensorSettings,
    ) -> Self {
        Self {
            engine,
            buffer: MeasurementBuffer::new(topology),
            addressing,
            zyxt,
            settings,
            mux: None,
            publishers: Vec::new(),
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a service for the topology described by `config`
    pub fn from_config(engine: AcquisitionEngine<T, P, D>, config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            engine,
            config.topology()?,
            config.addressing(),
            config.axis_mask()?.bits(),
            config.sensor.clone(),
        ))
    }

    /// Multiplexer handed to the engine on init
    pub fn with_mux(mut self, mux: MuxSelector<P, D>) -> Self {
        self.mux = Some(mux);
        self
    }

    pub fn add_publisher(&mut self, publisher: Box<dyn Publisher>) {
        info!(publisher = publisher.name(), "publisher added");
        self.publishers.push(publisher);
    }

    pub fn buffer(&self) -> &MeasurementBuffer {
        &self.buffer
    }

    pub fn engine(&self) -> &AcquisitionEngine<T, P, D> {
        &self.engine
    }

    /// Get the stop signal
    pub fn get_stop_signal(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    /// Request service to stop
    pub fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    fn is_stopping(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    /// Configure every node; returns the status written into the header.
    pub fn init(&mut self) -> Result<u8> {
        let status = self.engine.init_topology(
            self.buffer.topology(),
            self.addressing,
            &mut self.buffer,
            self.zyxt,
            self.mux.take(),
            &self.settings,
        )?;
        Ok(status)
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.engine.topology() != Some(self.buffer.topology()) {
            self.init()?;
        }
        Ok(())
    }

    /// Refill the buffer without publishing it.
    pub fn scan(&mut self) -> Result<()> {
        let topology = self.buffer.topology();
        self.engine.read_topology(topology, &mut self.buffer)?;
        Ok(())
    }

    /// Scan once and hand the buffer to every publisher.
    ///
    /// Returns how many publishers failed; failures are logged and do not
    /// abort the scan.
    pub fn read_once(&mut self) -> Result<usize> {
        self.scan()?;

        let mut failed = 0;
        for publisher in &mut self.publishers {
            if let Err(e) = publisher.publish(&self.buffer) {
                error!(publisher = publisher.name(), error = %e, "Failed to publish scan");
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Run until stopped or until `frame_limit` scans have been published.
    ///
    /// Returns the number of scans completed.
    pub fn run(&mut self, frame_limit: Option<u64>) -> Result<u64> {
        info!(topology = %self.buffer.topology(), ?frame_limit, "Starting acquisition service");
        self.ensure_initialized()?;

        let mut frames = 0u64;
        while !self.is_stopping() && frame_limit.is_none_or(|limit| frames < limit) {
            if let Err(e) = self.read_once() {
                error!(error = %e, frame = frames, "Scan failed");
                return Err(e);
            }
            frames += 1;
            debug!(frame = frames, "scan published");
        }

        info!(frames, "Acquisition service stopped");
        Ok(frames)
    }

    /// Time `readings` scans and report through `reporter`.
    pub fn benchmark<W: Write>(&mut self, readings: usize, reporter: &mut Reporter<W>) -> Result<Duration> {
        self.ensure_initialized()?;

        let started = Instant::now();
        for _ in 0..readings {
            self.scan()?;
        }
        let elapsed = started.elapsed();

        reporter.print_timing(elapsed, readings)?;
        Ok(elapsed)
    }
}

/// Setup signal handlers for graceful shutdown
pub fn setup_signal_handler(stop_signal: Arc<AtomicBool>) -> Result<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, stop_signal.clone())
            .map_err(|e| ServiceError::SignalError(e.to_string()))?;
    }
    Ok(())
}
