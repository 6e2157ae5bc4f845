//! Application configuration management.
//!
//! This module handles loading, parsing, and validating the application configuration
//! from TOML files with environment overrides (`MAGARRAY__SECTION__KEY`) and runtime
//! overrides from CLI arguments.

use std::path::Path;

use serde::Deserialize;

use crate::acquisition::{AddressPackage, Addressing, Topology};
use crate::error::{ConfigError, Result};
use crate::publisher::OutputFormat;
use crate::sensors::{AxisMask, SensorSettings};

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub sensor: SensorSettings,
    #[serde(default)]
    pub i2c: I2cConfig,
    #[serde(default)]
    pub mux: MuxConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Topology and addressing
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionConfig {
    #[serde(default = "default_nodes")]
    pub nodes: u32,
    #[serde(default = "default_zyxt")]
    pub zyxt: u8,
    #[serde(default = "default_address_package")]
    pub address_package: u32,
    /// Stop after this many scans; runs until interrupted when unset.
    #[serde(default)]
    pub frames: Option<u64>,
}

/// I2C lines, one per bank
#[derive(Debug, Deserialize, Clone)]
pub struct I2cConfig {
    #[serde(default = "default_buses")]
    pub buses: Vec<String>,
}

/// Multiplexer select lines (sysfs GPIO numbers)
#[derive(Debug, Deserialize, Clone)]
pub struct MuxConfig {
    #[serde(default = "default_s1_pin")]
    pub s1_pin: u64,
    #[serde(default = "default_s0_pin")]
    pub s0_pin: u64,
    #[serde(default = "default_settle_us")]
    pub settle_us: u32,
}

/// Serial output
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Serial device; stdout when unset.
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// SD card log
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub colored: bool,
}

// Default value functions
fn default_nodes() -> u32 {
    4
}

fn default_zyxt() -> u8 {
    AxisMask::XYZ.bits()
}

fn default_address_package() -> u32 {
    AddressPackage::from_addresses([0x0C, 0x0D, 0x0E, 0x0F]).0
}

fn default_buses() -> Vec<String> {
    vec!["/dev/i2c-1".to_string()]
}

fn default_s1_pin() -> u64 {
    23
}

fn default_s0_pin() -> u64 {
    24
}

fn default_settle_us() -> u32 {
    crate::acquisition::mux::DEFAULT_SETTLE_US
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_format() -> OutputFormat {
    OutputFormat::Ascii
}

fn default_storage_path() -> String {
    "MAGDATA.TXT".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            zyxt: default_zyxt(),
            address_package: default_address_package(),
            frames: None,
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            buses: default_buses(),
        }
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            s1_pin: default_s1_pin(),
            s0_pin: default_s0_pin(),
            settle_us: default_settle_us(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            format: default_format(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_storage_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colored: true,
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true, Self::environment())
    }

    /// Like [`AppConfig::from_file`], but a missing file leaves every value at
    /// its default. Environment overrides still apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), false, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("MAGARRAY")
            .separator("__")
            .try_parsing(true)
    }

    fn build(path: &Path, required: bool, environment: config::Environment) -> Result<Self> {
        let config: AppConfig = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(environment)
            .build()
            .map_err(ConfigError::LoadError)?
            .try_deserialize()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn topology(&self) -> Result<Topology> {
        Ok(Topology::from_node_count(self.acquisition.nodes)?)
    }

    pub fn addressing(&self) -> Addressing {
        let package = AddressPackage(self.acquisition.address_package);
        match self.acquisition.nodes {
            1 => Addressing::Single(package.addresses()[0]),
            _ => Addressing::Package(package),
        }
    }

    pub fn axis_mask(&self) -> Result<AxisMask> {
        Ok(AxisMask::new(self.acquisition.zyxt)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let topology = Topology::from_node_count(self.acquisition.nodes)
            .map_err(|_| invalid("acquisition.nodes", "must be 1, 4, 16, 32 or 64"))?;

        if AxisMask::new(self.acquisition.zyxt).is_err() {
            return Err(invalid("acquisition.zyxt", "must be between 0x1 and 0xF").into());
        }

        let addresses = AddressPackage(self.acquisition.address_package).addresses();
        let used = if topology == Topology::Single { 1 } else { 4 };
        if addresses[..used].iter().any(|a| *a > 0x7F) {
            return Err(invalid("acquisition.address_package", "addresses must be 7-bit").into());
        }

        if self.i2c.buses.len() < topology.banks() {
            return Err(ConfigError::InvalidValue {
                field: "i2c.buses".to_string(),
                message: format!("{} needs {} bus(es)", topology, topology.banks()),
            }
            .into());
        }

        let sensor = &self.sensor;
        if sensor.gain_sel > 7 {
            return Err(invalid("sensor.gain_sel", "must be 0..=7").into());
        }
        for (field, res) in [
            ("sensor.res_x", sensor.res_x),
            ("sensor.res_y", sensor.res_y),
            ("sensor.res_z", sensor.res_z),
        ] {
            if res > 3 {
                return Err(invalid(field, "must be 0..=3").into());
            }
        }
        if sensor.dig_filt > 7 {
            return Err(invalid("sensor.dig_filt", "must be 0..=7").into());
        }
        if sensor.osr > 3 {
            return Err(invalid("sensor.osr", "must be 0..=3").into());
        }

        if self.serial.baud_rate == 0 {
            return Err(invalid("serial.baud_rate", "must be greater than 0").into());
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(invalid("logging.format", "must be \"text\" or \"json\"").into());
        }

        Ok(())
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(frames) = cli.frames {
            self.acquisition.frames = Some(frames);
        }

        if let Some(format) = cli.format {
            self.serial.format = format;
        }

        if let Some(level) = cli.log_level {
            self.logging.level = level.to_filter_string().to_string();
        }

        if cli.no_sd {
            self.storage.enabled = false;
        }
    }
}
