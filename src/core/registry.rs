//! Device registry
//!
//! Keyed collection of connected device sessions. Structural changes take
//! the write lock; lookups share the read lock.

use super::session::{DeviceSession, SessionError};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Registry error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Identifier already registered
    #[error("Device already registered: {0}")]
    DuplicateId(String),

    /// Identifier not registered
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Session refused to connect; the entry was not added
    #[error("Device {id} failed to connect: {source}")]
    ConnectionFailed {
        /// Device identifier
        id: String,
        /// Underlying session error
        source: SessionError,
    },
}

/// Registry of named device sessions
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<DeviceSession>>>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `session` and register it under `id`
    pub async fn add(
        &self,
        id: &str,
        session: DeviceSession,
    ) -> Result<Arc<DeviceSession>, RegistryError> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }

        session
            .connect()
            .await
            .map_err(|source| RegistryError::ConnectionFailed {
                id: id.to_string(),
                source,
            })?;

        let session = Arc::new(session);
        devices.insert(id.to_string(), session.clone());
        info!(device = id, total = devices.len(), "device registered");
        Ok(session)
    }

    /// Disconnect the session registered under `id`, then drop the entry
    pub async fn remove(&self, id: &str) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().await;
        let session = devices
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        if let Err(e) = session.disconnect().await {
            warn!(device = id, error = %e, "disconnect during removal failed");
        }
        devices.remove(id);
        info!(device = id, total = devices.len(), "device removed");
        Ok(())
    }

    /// Look up a session
    pub async fn get(&self, id: &str) -> Result<Arc<DeviceSession>, RegistryError> {
        self.devices
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Check if `id` is registered
    pub async fn contains(&self, id: &str) -> bool {
        self.devices.read().await.contains_key(id)
    }

    /// Registered identifiers, in no particular order
    pub async fn list_ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Number of registered devices
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Is the registry empty?
    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Disconnect every session concurrently and clear the registry
    pub async fn shutdown(&self) {
        let mut devices = self.devices.write().await;
        let sessions: Vec<_> = devices.drain().collect();
        let results = join_all(
            sessions
                .iter()
                .map(|(_, session)| session.disconnect()),
        )
        .await;

        for ((id, _), result) in sessions.iter().zip(results) {
            if let Err(e) = result {
                warn!(device = %id, error = %e, "disconnect during shutdown failed");
            }
        }
        info!(count = sessions.len(), "registry shut down");
    }
}
