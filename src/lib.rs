//! # Labmon Core Library
//!
//! Device communication and monitoring for simulated lab instruments:
//! - Command channels with one request in flight at a time
//! - Instrument simulator answering `TEMP?`, `ID?` and `TEMP:<value>`
//! - Device sessions and a registry of named devices
//! - Timed sampling and stability checks with cancellation
//! - Per-device fan-out of live samples to subscribers
//! - Sample history sinks (memory, CSV, JSON Lines)
//!
//! ## Example
//!
//! ```rust,no_run
//! use labmon_core::{DeviceRegistry, DeviceSession, Monitor, SimulatorConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = DeviceRegistry::new();
//!     let session = registry
//!         .add("dev1", DeviceSession::simulated("dev1", &SimulatorConfig::default()))
//!         .await?;
//!
//!     session.set_temperature(22.0).await?;
//!     println!("now {}", session.get_temperature().await?);
//!
//!     let monitor = Monitor::new("dev1", session);
//!     let samples = monitor
//!         .sample(Duration::from_secs(3), Duration::from_secs(1), &CancellationToken::new())
//!         .await;
//!     println!("{} samples", samples.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, DeviceProfile};
pub use crate::core::broadcast::{BroadcastHub, SampleSink, SinkError, SubscriberId, Subscription};
pub use crate::core::channel::{ChannelError, ChannelStats, CommandChannel, SimulatedChannel};
pub use crate::core::logger::{FileLog, LogError, LogFormat, LogRecord, LogSink, MemoryLog};
pub use crate::core::monitor::{
    assess_stability, find_outliers, Monitor, MonitorConfig, StabilityReport,
};
pub use crate::core::registry::{DeviceRegistry, RegistryError};
pub use crate::core::sample::Sample;
pub use crate::core::session::{DeviceSession, SessionError, SessionState, SessionStats};
pub use crate::core::simulator::{Command, InstrumentSimulator, Response, SimulatorConfig};
pub use crate::error::{Error, FailureClass, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
