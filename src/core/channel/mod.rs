//! Command channel layer
//!
//! A channel is an ordered request/response transport to one instrument.
//! Exactly one command may be in flight: `write` a command, then `read`
//! its response before writing the next one.

mod simulated;

pub use simulated::SimulatedChannel;

use async_trait::async_trait;
use thiserror::Error;

/// Channel error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation on a closed channel
    #[error("Channel not open")]
    NotOpen,

    /// `open` on a channel that is already open
    #[error("Channel unavailable: already open")]
    Unavailable,

    /// A second command was written before the previous response was read
    #[error("Response pending: read the previous response first")]
    ResponsePending,

    /// `read` without an outstanding command
    #[error("No command awaiting a response")]
    NoPendingCommand,
}

/// Channel statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Commands written
    pub commands_sent: u64,
    /// Responses read
    pub responses_received: u64,
    /// Errors count
    pub errors: u64,
}

/// Request/response transport to a single instrument
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send {
    /// Transition from closed to open
    async fn open(&mut self) -> Result<(), ChannelError>;

    /// Close the channel. Closing a closed channel is a no-op.
    async fn close(&mut self);

    /// Check if open
    fn is_open(&self) -> bool;

    /// Write one command line
    async fn write(&mut self, command: &str) -> Result<(), ChannelError>;

    /// Read the response to the last written command, verbatim
    async fn read(&mut self) -> Result<String, ChannelError>;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> ChannelStats;
}
