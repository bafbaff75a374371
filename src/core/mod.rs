//! Core module containing the device communication and monitoring layer
//!
//! This module provides:
//! - Command channel abstraction and the simulated channel
//! - Instrument simulator answering the textual command set
//! - Device sessions with connect/disconnect lifecycle
//! - Device registry keyed by identifier
//! - Monitor for timed sampling and stability checks
//! - Broadcast hub fanning live samples out to subscribers
//! - Log sinks for sample history

pub mod broadcast;
pub mod channel;
pub mod logger;
pub mod monitor;
pub mod registry;
pub mod sample;
pub mod session;
pub mod simulator;
