//! Command-line interface argument parsing.
//!
//! This module defines the CLI structure and parsing logic using gumdrop.
//! Every option except the config path overrides a value from the config file.

use std::path::PathBuf;
use std::str::FromStr;

use gumdrop::Options;

use crate::publisher::OutputFormat;

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Show all messages including trace
    Trace,
    /// Show debug messages and above
    Debug,
    /// Show info messages and above (default)
    Info,
    /// Show warnings and errors only
    Warn,
    /// Show errors only
    Error,
}

impl LogLevel {
    /// Convert LogLevel to an `EnvFilter` directive
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// magarray: scan an MLX90393 array and stream the buffers
#[derive(Debug, Options)]
pub struct Cli {
    #[options(help = "print help message")]
    pub help: bool,

    #[options(help = "path to configuration file", default = "magarray.toml")]
    pub config: PathBuf,

    #[options(help = "log level: trace, debug, info, warn, error")]
    pub log_level: Option<LogLevel>,

    #[options(help = "stop after this many scans")]
    pub frames: Option<u64>,

    #[options(short = "o", help = "serial output format: binary, hex, ascii")]
    pub format: Option<OutputFormat>,

    #[options(help = "disable SD card logging")]
    pub no_sd: bool,

    #[options(help = "time 1000 scans and print the result")]
    pub benchmark: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse_args_default_or_exit()
    }
}
