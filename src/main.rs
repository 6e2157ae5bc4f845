//! magarray binary: scan the sensor array and stream every buffer.
//!
//! Loads the TOML configuration, opens the I2C lines and multiplexer pins,
//! initialises the selected topology and then publishes scans until SIGINT,
//! SIGTERM or the frame limit.

use anyhow::{Context, Result};

use magarray::cli::Cli;
use magarray::config::AppConfig;

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.apply_cli_overrides(cli);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = load_config(&cli)?;
    magarray::logging::init_logging(&config.logging).context("failed to initialise logging")?;

    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults and environment");
    }

    run(&cli, &config)
}

#[cfg(target_os = "linux")]
fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    use std::io;
    use std::time::Duration;

    use linux_embedded_hal::sysfs_gpio::Direction;
    use linux_embedded_hal::{Delay, SysfsPin};
    use tracing::{info, warn};

    use magarray::acquisition::{AcquisitionEngine, MuxSelector};
    use magarray::frame::ChannelLayout;
    use magarray::publisher::{LoggingPublisher, SdCardPublisher, SerialPublisher};
    use magarray::report::Reporter;
    use magarray::sensors::i2c::open_banks;
    use magarray::service::{AcquisitionService, BENCHMARK_READINGS, setup_signal_handler};
    use magarray::storage::SdCard;

    fn output_pin(number: u64) -> Result<SysfsPin> {
        let pin = SysfsPin::new(number);
        pin.export()
            .with_context(|| format!("failed to export GPIO {}", number))?;
        pin.set_direction(Direction::Low)
            .with_context(|| format!("failed to drive GPIO {}", number))?;
        Ok(pin)
    }

    let topology = config.topology()?;
    let layout = ChannelLayout::new(config.axis_mask()?, &config.sensor);

    let banks = open_banks(&config.i2c.buses[..topology.banks()])?;
    let engine: AcquisitionEngine<_, SysfsPin, Delay> = AcquisitionEngine::new(banks);
    let mut service = AcquisitionService::from_config(engine, config)?;

    if topology.is_multiplexed() {
        let mux = MuxSelector::new(
            output_pin(config.mux.s1_pin)?,
            output_pin(config.mux.s0_pin)?,
            Delay,
        )
        .with_settle_us(config.mux.settle_us);
        info!(s1 = config.mux.s1_pin, s0 = config.mux.s0_pin, "multiplexer pins ready");
        service = service.with_mux(mux);
    }

    let status = service.init()?;
    info!(%topology, status, "array ready");

    if cli.benchmark {
        let mut reporter = Reporter::new(io::stdout());
        service.benchmark(BENCHMARK_READINGS, &mut reporter)?;
        return Ok(());
    }

    match &config.serial.port {
        Some(port) => {
            let serial = serialport::new(port.as_str(), config.serial.baud_rate)
                .timeout(Duration::from_millis(100))
                .open()
                .with_context(|| format!("failed to open serial port {}", port))?;
            info!(port = %port, baud = config.serial.baud_rate, "serial output opened");
            let reporter = Reporter::new(serial).with_layout(layout.clone());
            service.add_publisher(Box::new(SerialPublisher::new(reporter, config.serial.format)));
        }
        None => {
            let reporter = Reporter::new(io::stdout()).with_layout(layout.clone());
            service.add_publisher(Box::new(SerialPublisher::new(reporter, config.serial.format)));
        }
    }

    if config.storage.enabled {
        let mut card = SdCard::new().with_layout(layout);
        if !card.init_sd_card(&config.storage.path) {
            warn!(path = %config.storage.path, "continuing without SD card log");
        }
        service.add_publisher(Box::new(SdCardPublisher::new(card)));
    }
    service.add_publisher(Box::new(LoggingPublisher));

    setup_signal_handler(service.get_stop_signal())?;
    service.run(config.acquisition.frames)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: &Cli, _config: &AppConfig) -> Result<()> {
    anyhow::bail!("magarray drives Linux I2C and GPIO devices and cannot run on this platform")
}
