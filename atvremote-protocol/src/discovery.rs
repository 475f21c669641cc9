//! TV discovery via mDNS
//!
//! Android TVs advertise the remote service as `_androidtvremote2._tcp`;
//! resolving an instance yields the host and control port a [`TVDevice`]
//! needs. Browsing runs on a background task and surfaces results as
//! events.

use crate::device::TVDevice;
use crate::error::{RemoteError, Result};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::net::IpAddr;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// mDNS service type for the Android TV remote protocol
pub const SERVICE_TYPE: &str = "_androidtvremote2._tcp.local.";

/// Discovery results
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A TV was resolved on the network
    Found(TVDevice),
    /// A previously advertised instance disappeared
    Lost { instance: String },
}

/// mDNS browser for Android TVs
pub struct Discovery {
    daemon: ServiceDaemon,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| RemoteError::Discovery(format!("mDNS daemon: {}", e)))?;
        Ok(Self { daemon })
    }

    /// Start browsing; events arrive on the returned channel until the
    /// daemon is shut down or the receiver is dropped
    pub fn browse(&self) -> Result<mpsc::UnboundedReceiver<DiscoveryEvent>> {
        let receiver = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|e| RemoteError::Discovery(format!("browse: {}", e)))?;
        info!(service = SERVICE_TYPE, "browsing for TVs");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let Some(device) = device_from_service(
                            info.get_fullname(),
                            info.get_addresses().iter().copied().collect(),
                            info.get_port(),
                        ) else {
                            continue;
                        };
                        debug!(id = %device.id, name = %device.name, "resolved TV");
                        if tx.send(DiscoveryEvent::Found(device)).is_err() {
                            break;
                        }
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        let instance = instance_name(&fullname);
                        debug!(instance = %instance, "TV disappeared");
                        if tx.send(DiscoveryEvent::Lost { instance }).is_err() {
                            break;
                        }
                    }
                    other => {
                        debug!(?other, "mDNS event");
                    }
                }
            }
        });

        Ok(rx)
    }

    pub fn shutdown(self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "mDNS daemon shutdown failed");
        }
    }
}

fn device_from_service(fullname: &str, addresses: Vec<IpAddr>, port: u16) -> Option<TVDevice> {
    if addresses.is_empty() {
        debug!(fullname, "service has no addresses, skipping");
        return None;
    }
    // prefer IPv4; the TVs listen on both but advertise v4 reliably
    let addr = addresses
        .iter()
        .find(|a| a.is_ipv4())
        .copied()
        .unwrap_or(addresses[0]);

    Some(TVDevice::new(
        instance_name(fullname),
        addr.to_string(),
        port,
    ))
}

/// Instance part of a full service name, e.g.
/// `Living Room TV._androidtvremote2._tcp.local.` → `Living Room TV`
fn instance_name(fullname: &str) -> String {
    fullname
        .strip_suffix(SERVICE_TYPE)
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or(fullname)
        .to_string()
}
