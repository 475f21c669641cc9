//! TV device records and the paired-device registry
//!
//! A [`TVDevice`] is created by discovery and identifies one Android TV on
//! the LAN. Once paired it is immutable except for the `paired` flag. The
//! registry persists paired devices as a JSON array so pairings survive
//! restarts.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// TCP port for the remote-control channel
pub const DEFAULT_CONTROL_PORT: u16 = 6466;

/// TCP port for the PIN pairing handshake, fixed by the protocol
pub const PAIRING_PORT: u16 = 6467;

/// One Android TV on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TVDevice {
    /// Stable identifier, `host:port`
    pub id: String,

    /// Human-readable name from discovery
    pub name: String,

    /// LAN address
    pub host: String,

    /// Remote-control port (6466 unless the TV advertises otherwise)
    #[serde(rename = "port")]
    pub control_port: u16,

    /// Whether a pairing handshake has completed against this TV
    #[serde(rename = "isPaired")]
    pub paired: bool,
}

impl TVDevice {
    pub fn new(name: impl Into<String>, host: impl Into<String>, control_port: u16) -> Self {
        let host = host.into();
        Self {
            id: format!("{}:{}", host, control_port),
            name: name.into(),
            host,
            control_port,
            paired: false,
        }
    }

    /// The pairing handshake always runs on port 6467, regardless of the
    /// advertised control port
    pub fn pairing_port(&self) -> u16 {
        PAIRING_PORT
    }

    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }

    pub fn pairing_addr(&self) -> String {
        format!("{}:{}", self.host, self.pairing_port())
    }
}

/// Registry of known devices, keyed by device id, persisted as JSON
pub struct DeviceRegistry {
    devices: HashMap<String, TVDevice>,
    registry_path: Option<PathBuf>,
}

impl DeviceRegistry {
    /// In-memory registry; nothing is persisted
    pub fn in_memory() -> Self {
        Self {
            devices: HashMap::new(),
            registry_path: None,
        }
    }

    /// Registry backed by a JSON file, loaded immediately
    pub fn new(registry_path: impl Into<PathBuf>) -> Result<Self> {
        let registry_path = registry_path.into();
        if let Some(parent) = registry_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut registry = Self {
            devices: HashMap::new(),
            registry_path: Some(registry_path),
        };
        registry.load()?;
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&TVDevice> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Add or replace a device and persist the registry
    pub fn add(&mut self, device: TVDevice) -> Result<()> {
        info!(id = %device.id, name = %device.name, "adding device to registry");
        self.devices.insert(device.id.clone(), device);
        self.save()
    }

    /// Remove a device; returns it if it was present
    pub fn remove(&mut self, id: &str) -> Result<Option<TVDevice>> {
        let removed = self.devices.remove(id);
        if removed.is_some() {
            info!(id, "removed device from registry");
            self.save()?;
        }
        Ok(removed)
    }

    /// Mark a device paired and persist
    pub fn mark_paired(&mut self, id: &str) -> Result<()> {
        if let Some(device) = self.devices.get_mut(id) {
            device.paired = true;
            self.save()?;
        }
        Ok(())
    }

    pub fn devices(&self) -> impl Iterator<Item = &TVDevice> {
        self.devices.values()
    }

    pub fn paired_devices(&self) -> Vec<TVDevice> {
        self.devices.values().filter(|d| d.paired).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.registry_path else {
            return Ok(());
        };
        let records: Vec<&TVDevice> = self.devices.values().collect();
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(path, json)?;
        debug!(count = records.len(), "saved device registry");
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let Some(path) = &self.registry_path else {
            return Ok(());
        };
        if !path.exists() {
            debug!(?path, "no existing device registry");
            return Ok(());
        }

        let json = fs::read_to_string(path)?;
        let records: Vec<TVDevice> = serde_json::from_str(&json)?;
        self.devices = records.into_iter().map(|d| (d.id.clone(), d)).collect();
        info!(count = self.devices.len(), "loaded device registry");
        Ok(())
    }
}
