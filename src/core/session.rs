//! Device sessions
//!
//! A session couples one command channel to a connect/disconnect lifecycle
//! and exposes typed instrument operations built from raw commands.

use super::channel::{ChannelError, ChannelStats, CommandChannel, SimulatedChannel};
use super::simulator::{
    Response, SimulatorConfig, CMD_ID_QUERY, CMD_TEMP_QUERY, CMD_TEMP_SET, RESPONSE_OK,
};
use parking_lot::RwLock;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,
    /// Connected and active
    Connected,
    /// Channel failed; must reconnect before further commands
    Failed,
}

/// Session error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Command issued while disconnected
    #[error("Device not connected")]
    NotConnected,

    /// Channel failure
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Instrument answered with an error payload
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Response was neither an error nor a parsable value
    #[error("Malformed response: {0:?}")]
    MalformedResponse(String),
}

/// Session statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Underlying channel counters
    pub channel: ChannelStats,
    /// Seconds since the last successful connect
    pub uptime_secs: u64,
}

/// Session over one command channel
pub struct DeviceSession {
    /// Session name
    name: String,
    /// Current state
    state: RwLock<SessionState>,
    /// Channel; the lock enforces one request at a time
    channel: Mutex<Box<dyn CommandChannel>>,
    /// Time of last connect
    connected_at: RwLock<Option<Instant>>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Create a disconnected session over `channel`
    pub fn new(name: &str, channel: impl CommandChannel + 'static) -> Self {
        Self::from_boxed(name, Box::new(channel))
    }

    /// Create a disconnected session over a boxed channel
    pub fn from_boxed(name: &str, channel: Box<dyn CommandChannel>) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(SessionState::Disconnected),
            channel: Mutex::new(channel),
            connected_at: RwLock::new(None),
        }
    }

    /// Create a session to a fresh simulated instrument
    pub fn simulated(name: &str, config: &SimulatorConfig) -> Self {
        Self::new(name, SimulatedChannel::new(name, config))
    }

    /// Get session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Open the channel. Connecting a connected session is a no-op.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let mut channel = self.channel.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        match channel.open().await {
            Ok(()) => {
                *self.state.write() = SessionState::Connected;
                *self.connected_at.write() = Some(Instant::now());
                info!(device = %self.name, info = %channel.connection_info(), "connected");
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.name, error = %e, "connect failed");
                Err(e.into())
            }
        }
    }

    /// Close the channel. Safe to call when already disconnected.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let mut channel = self.channel.lock().await;
        channel.close().await;
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Disconnected);
        *self.connected_at.write() = None;
        if previous == SessionState::Connected {
            info!(device = %self.name, "disconnected");
        }
        Ok(())
    }

    /// Write one command, read its response and return it trimmed
    pub async fn send_command(&self, command: &str) -> Result<String, SessionError> {
        let mut channel = self.channel.lock().await;
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let exchange = match channel.write(command).await {
            Ok(()) => channel.read().await,
            Err(e) => Err(e),
        };

        match exchange {
            Ok(raw) => {
                let response = raw.trim().to_string();
                debug!(device = %self.name, command, response = %response, "command");
                Ok(response)
            }
            Err(e) => {
                // Leave the session disconnected so later calls fail fast.
                channel.close().await;
                *self.state.write() = SessionState::Failed;
                *self.connected_at.write() = None;
                warn!(device = %self.name, command, error = %e, "channel failed, session disconnected");
                Err(e.into())
            }
        }
    }

    /// Query the current reading
    pub async fn get_temperature(&self) -> Result<f64, SessionError> {
        let text = self.send_command(CMD_TEMP_QUERY).await?;
        match Response::parse(&text) {
            Response::Error(reason) => Err(SessionError::Instrument(reason)),
            Response::Value(value) => value
                .parse::<f64>()
                .map_err(|_| SessionError::MalformedResponse(value)),
        }
    }

    /// Set the reading; true only when the instrument acknowledges with `OK`
    pub async fn set_temperature(&self, value: f64) -> Result<bool, SessionError> {
        let text = self.send_command(&format!("{}:{}", CMD_TEMP_SET, value)).await?;
        Ok(text == RESPONSE_OK)
    }

    /// Query the raw identity string
    pub async fn get_identity(&self) -> Result<String, SessionError> {
        self.send_command(CMD_ID_QUERY).await
    }

    /// Get session statistics
    pub async fn stats(&self) -> SessionStats {
        let channel = self.channel.lock().await;
        SessionStats {
            channel: channel.stats(),
            uptime_secs: self
                .connected_at
                .read()
                .map(|t| t.elapsed().as_secs())
                .unwrap_or(0),
        }
    }

    /// Get connection info string
    pub async fn connection_info(&self) -> String {
        self.channel.lock().await.connection_info()
    }
}
