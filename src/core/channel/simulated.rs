//! In-process channel to an instrument simulator

use super::{ChannelError, ChannelStats, CommandChannel};
use crate::core::simulator::{InstrumentSimulator, LatencyConfig, SimulatorConfig};
use async_trait::async_trait;
use tracing::debug;

/// Channel that answers commands from an owned [`InstrumentSimulator`]
#[derive(Debug)]
pub struct SimulatedChannel {
    name: String,
    simulator: InstrumentSimulator,
    latency: LatencyConfig,
    open: bool,
    pending: Option<String>,
    stats: ChannelStats,
}

impl SimulatedChannel {
    /// Create a channel to a new simulator built from `config`
    pub fn new(name: &str, config: &SimulatorConfig) -> Self {
        Self::with_simulator(name, InstrumentSimulator::new(config), config.latency.clone())
    }

    /// Create a channel around an existing simulator
    pub fn with_simulator(name: &str, simulator: InstrumentSimulator, latency: LatencyConfig) -> Self {
        Self {
            name: name.to_string(),
            simulator,
            latency,
            open: false,
            pending: None,
            stats: ChannelStats::default(),
        }
    }
}

#[async_trait]
impl CommandChannel for SimulatedChannel {
    async fn open(&mut self) -> Result<(), ChannelError> {
        if self.open {
            self.stats.errors += 1;
            return Err(ChannelError::Unavailable);
        }
        self.open = true;
        self.pending = None;
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
        self.pending = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write(&mut self, command: &str) -> Result<(), ChannelError> {
        if !self.open {
            self.stats.errors += 1;
            return Err(ChannelError::NotOpen);
        }
        if self.pending.is_some() {
            self.stats.errors += 1;
            return Err(ChannelError::ResponsePending);
        }

        let response = self.simulator.handle_text(command);
        debug!(channel = %self.name, command, response = %response, "simulated exchange");
        self.pending = Some(response);
        self.stats.commands_sent += 1;
        Ok(())
    }

    async fn read(&mut self) -> Result<String, ChannelError> {
        if !self.open {
            self.stats.errors += 1;
            return Err(ChannelError::NotOpen);
        }

        let delay = self.latency.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.pending.take() {
            Some(response) => {
                self.stats.responses_received += 1;
                Ok(response)
            }
            None => {
                self.stats.errors += 1;
                Err(ChannelError::NoPendingCommand)
            }
        }
    }

    fn connection_info(&self) -> String {
        format!("sim://{}", self.name)
    }

    fn stats(&self) -> ChannelStats {
        self.stats
    }
}
