//! Runtime for the LED light panel controller.
//!
//! Connects the [`lightpanel_protocol`] state machine to the panel's serial
//! line, drives the "connected" indicator LED and exposes the panel
//! operations over HTTP.
//!
//! ```text
//!  HTTP handlers ──► PanelHandle ──► PanelActor ──► Link ──► serial port
//!                                     │   ▲                      │
//!                                     │   └──── LinkEvent ◄──────┘
//!                                     └──► Indicator (GPIO)
//! ```

pub mod actor;
pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod indicator;
pub mod link;
pub mod metrics;

pub use actor::{PanelActor, PanelHandle, PanelOp, PanelSnapshot};
pub use app::{run, start_panel};
pub use config::{Cli, FileConfig, LinkTarget, RunnerConfig};
pub use error::{ConfigError, LinkError, RequestError, RunnerError};
pub use indicator::{indicator_for, Indicator, LogIndicator, SysfsGpioIndicator};
pub use link::{Link, LinkEvent, LinkStream};
