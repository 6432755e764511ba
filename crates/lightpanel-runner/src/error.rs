//! Error types for the panel runner.

use std::io;
use std::path::PathBuf;

use lightpanel_protocol::PanelError;
use thiserror::Error;

/// Errors raised by the serial link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No link target was configured, so the link cannot be (re)opened.
    #[error("no serial link target configured")]
    NoTarget,

    /// Opening the serial device failed.
    #[error("failed to open serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Connecting to a TCP serial bridge failed.
    #[error("failed to connect to serial bridge {addr}: {source}")]
    Tcp {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Writing to an open link failed. The link is closed afterwards.
    #[error("failed to write to serial link: {0}")]
    Write(#[source] io::Error),
}

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::config::FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned to callers of [`crate::actor::PanelHandle`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// The state machine refused the operation.
    #[error(transparent)]
    Panel(#[from] PanelError),

    /// The command was accepted but could not be written to the panel.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The panel actor has stopped.
    #[error("panel actor is not running")]
    ActorGone,
}

/// Top-level errors of the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding the HTTP listener failed.
    #[error("failed to bind HTTP listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server error: {0}")]
    Serve(#[source] io::Error),

    /// Installing the metrics exporter failed.
    #[error("failed to install metrics exporter: {0}")]
    Metrics(String),
}
