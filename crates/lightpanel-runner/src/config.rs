//! Runner configuration.
//!
//! Settings come from three layers, highest priority first:
//!
//! 1. Command line flags (and their environment variables)
//! 2. An optional YAML file passed with `--config`
//! 3. Built-in defaults
//!
//! ## Example YAML
//!
//! ```yaml
//! http_port: 8800
//! link:
//!   serial:
//!     path: /dev/serial0
//!     baud_rate: 9600
//! indicator_pin: 17
//! ack_warn_after_ms: 5000
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8800;

/// Default serial device on the Raspberry Pi.
pub const DEFAULT_SERIAL_PATH: &str = "/dev/serial0";

/// Default serial baud rate of the panel firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// BCM GPIO driving the "connected" LED (physical header pin 11).
pub const DEFAULT_INDICATOR_PIN: u32 = 17;

/// Default threshold for the acknowledgement watchdog.
pub const DEFAULT_ACK_WARN_AFTER_MS: u64 = 5000;

/// Command line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "lightpanel", version, about = "HTTP controller for the LED light panel")]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// HTTP port to listen on.
    #[arg(short, long, env = "LIGHTPANEL_PORT")]
    pub port: Option<u16>,

    /// Serial device connected to the panel.
    #[arg(long, conflicts_with = "tcp")]
    pub serial: Option<String>,

    /// Serial baud rate.
    #[arg(long)]
    pub baud: Option<u32>,

    /// Reach the panel through a TCP serial bridge (host:port) instead of a
    /// local serial device.
    #[arg(long)]
    pub tcp: Option<String>,

    /// BCM GPIO number of the "connected" indicator LED.
    #[arg(long, conflicts_with = "no_indicator")]
    pub indicator_pin: Option<u32>,

    /// Do not drive a GPIO indicator; only log indicator changes.
    #[arg(long)]
    pub no_indicator: bool,

    /// Warn when an acknowledgement is outstanding longer than this (0 disables).
    #[arg(long)]
    pub ack_warn_after_ms: Option<u64>,

    /// Address for the Prometheus metrics exporter.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Where the panel's serial line is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    /// A local serial device.
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// A serial line bridged over TCP.
    Tcp { addr: String },
}

impl Default for LinkTarget {
    fn default() -> Self {
        LinkTarget::Serial {
            path: DEFAULT_SERIAL_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkTarget::Serial { path, baud_rate } => write!(f, "{} @ {} baud", path, baud_rate),
            LinkTarget::Tcp { addr } => write!(f, "tcp://{}", addr),
        }
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Contents of the YAML configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub http_port: Option<u16>,
    pub link: Option<LinkTarget>,
    pub indicator_pin: Option<u32>,
    pub indicator: Option<bool>,
    pub ack_warn_after_ms: Option<u64>,
    pub metrics_addr: Option<SocketAddr>,
}

impl FileConfig {
    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML text.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(FileConfig::default());
        }
        serde_yaml::from_str(text)
    }
}

/// Fully resolved runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// HTTP port.
    pub http_port: u16,
    /// Serial link target.
    pub link: LinkTarget,
    /// GPIO for the indicator LED, `None` to only log.
    pub indicator_pin: Option<u32>,
    /// Acknowledgement watchdog threshold, `None` when disabled.
    pub ack_warn_after: Option<Duration>,
    /// Prometheus exporter address.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            http_port: DEFAULT_HTTP_PORT,
            link: LinkTarget::default(),
            indicator_pin: Some(DEFAULT_INDICATOR_PIN),
            ack_warn_after: Some(Duration::from_millis(DEFAULT_ACK_WARN_AFTER_MS)),
            metrics_addr: None,
        }
    }
}

impl RunnerConfig {
    /// Resolve the configuration from the command line, loading the
    /// configuration file it names (if any).
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merge command line flags over file settings over defaults.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = RunnerConfig::default();

        let http_port = cli.port.or(file.http_port).unwrap_or(defaults.http_port);

        let mut link = file.link.unwrap_or(defaults.link);
        if let Some(addr) = &cli.tcp {
            link = LinkTarget::Tcp { addr: addr.clone() };
        } else if let Some(path) = &cli.serial {
            let baud_rate = match link {
                LinkTarget::Serial { baud_rate, .. } => baud_rate,
                LinkTarget::Tcp { .. } => DEFAULT_BAUD_RATE,
            };
            link = LinkTarget::Serial { path: path.clone(), baud_rate };
        }
        if let Some(baud) = cli.baud {
            match &mut link {
                LinkTarget::Serial { baud_rate, .. } => *baud_rate = baud,
                LinkTarget::Tcp { .. } => {
                    return Err(ConfigError::Invalid(
                        "--baud only applies to a serial device link".to_string(),
                    ))
                }
            }
        }
        if let LinkTarget::Serial { baud_rate: 0, .. } = link {
            return Err(ConfigError::Invalid("baud rate must be positive".to_string()));
        }

        let indicator_pin = if cli.no_indicator || file.indicator == Some(false) {
            None
        } else {
            cli.indicator_pin.or(file.indicator_pin).or(defaults.indicator_pin)
        };

        let ack_warn_after = match cli.ack_warn_after_ms.or(file.ack_warn_after_ms) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.ack_warn_after,
        };

        Ok(RunnerConfig {
            http_port,
            link,
            indicator_pin,
            ack_warn_after,
            metrics_addr: cli.metrics_addr.or(file.metrics_addr),
        })
    }
}
