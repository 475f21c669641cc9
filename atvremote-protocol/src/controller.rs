//! Controller façade
//!
//! Owns the paired-device registry, at most one remote session, and at most
//! one pairing session, and orchestrates the pairing → remote-session
//! lifecycle. Every state transition is published to subscribers so a UI can
//! mirror connection state, pairing progress, the paired list, and the last
//! error without polling.

use crate::device::{DeviceRegistry, TVDevice};
use crate::error::{RemoteError, Result};
use crate::identity::IdentityStore;
use crate::pairing::{PairingEvent, PairingSession, PairingState};
use crate::remote::{KeyCode, RemoteEvent, RemoteSession};
use crate::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Events published by the controller
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A remote session is being established
    Connecting { device_id: String },
    /// The remote session is active
    Connected { device_id: String },
    /// The remote session ended, with a reason when it was an error
    Disconnected {
        device_id: String,
        reason: Option<String>,
    },
    /// The pairing session changed state
    PairingStateChanged {
        device_id: String,
        state: PairingState,
    },
    /// The TV is showing a PIN that must be submitted
    PairingCodeRequired { device_id: String },
    /// Pairing completed and the device joined the paired list
    DevicePaired { device: TVDevice },
    /// A device left the paired list
    DeviceRemoved { device_id: String },
    /// A pairing or session error surfaced
    Error { message: String },
}

type Subscribers = Arc<RwLock<Vec<mpsc::UnboundedSender<ControllerEvent>>>>;

/// Orchestrates pairing, the remote session, and the device list
pub struct RemoteController {
    config: ClientConfig,
    identity_store: Arc<IdentityStore>,
    registry: Arc<RwLock<DeviceRegistry>>,
    session: Option<RemoteSession>,
    pairing: Option<PairingSession>,
    subscribers: Subscribers,
    last_error: Arc<Mutex<Option<String>>>,
    connecting: Arc<AtomicBool>,
}

impl RemoteController {
    pub fn new(
        config: ClientConfig,
        identity_store: IdentityStore,
        registry: DeviceRegistry,
    ) -> Self {
        Self {
            config,
            identity_store: Arc::new(identity_store),
            registry: Arc::new(RwLock::new(registry)),
            session: None,
            pairing: None,
            subscribers: Arc::new(RwLock::new(Vec::new())),
            last_error: Arc::new(Mutex::new(None)),
            connecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receive every controller event from now on
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<ControllerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().await.push(tx);
        rx
    }

    pub async fn paired_devices(&self) -> Vec<TVDevice> {
        self.registry.read().await.paired_devices()
    }

    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(RemoteSession::is_connected)
            .unwrap_or(false)
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing
            .as_ref()
            .map(PairingSession::state)
            .unwrap_or(PairingState::Idle)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("last error poisoned").clone()
    }

    /// Add a device to the paired list
    pub async fn add_paired(&self, mut device: TVDevice) -> Result<()> {
        device.paired = true;
        self.registry.write().await.add(device.clone())?;
        emit(&self.subscribers, ControllerEvent::DevicePaired { device }).await;
        Ok(())
    }

    /// Remove a device, disconnecting first when it holds the active session
    pub async fn remove_paired(&mut self, device_id: &str) -> Result<()> {
        let holds_session = self
            .session
            .as_ref()
            .is_some_and(|session| session.device().id == device_id);
        if holds_session {
            self.disconnect().await;
        }

        let removed = self.registry.write().await.remove(device_id)?;
        if removed.is_some() {
            emit(
                &self.subscribers,
                ControllerEvent::DeviceRemoved {
                    device_id: device_id.to_string(),
                },
            )
            .await;
        }
        Ok(())
    }

    /// Open the remote session to `device`. Any prior session is closed
    /// first; at most one is active at a time.
    pub async fn connect(&mut self, device: &TVDevice) -> Result<()> {
        self.disconnect().await;

        info!(device = %device.id, "connecting remote session");
        self.connecting.store(true, Ordering::SeqCst);
        emit(
            &self.subscribers,
            ControllerEvent::Connecting {
                device_id: device.id.clone(),
            },
        )
        .await;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let result =
            RemoteSession::connect(device.clone(), &self.identity_store, &self.config, event_tx)
                .await;
        self.connecting.store(false, Ordering::SeqCst);

        match result {
            Ok(session) => {
                tokio::spawn(forward_remote_events(
                    event_rx,
                    device.id.clone(),
                    self.subscribers.clone(),
                    self.last_error.clone(),
                ));
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                self.record_error(e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Close the active remote session, if any
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(device = %session.device().id, "disconnecting remote session");
            session.disconnect().await;
        }
    }

    /// Inject a key press on the active session
    pub fn send_command(&self, key: KeyCode) -> Result<()> {
        match &self.session {
            Some(session) if session.is_connected() => {
                session.send_command(key);
                Ok(())
            }
            _ => Err(RemoteError::NotConnected),
        }
    }

    /// Begin pairing with `device`; any in-flight pairing is cancelled first
    pub async fn start_pairing(&mut self, device: &TVDevice) {
        self.cancel_pairing();

        info!(device = %device.id, "starting pairing");
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = PairingSession::start(
            device.clone(),
            self.identity_store.clone(),
            self.config.name.clone(),
            event_tx,
        );

        tokio::spawn(forward_pairing_events(
            event_rx,
            device.clone(),
            self.registry.clone(),
            self.subscribers.clone(),
            self.last_error.clone(),
        ));
        self.pairing = Some(session);
    }

    /// Submit the PIN shown on the TV to the in-flight pairing
    pub fn submit_code(&self, code: &str) -> Result<()> {
        self.pairing
            .as_ref()
            .ok_or(RemoteError::NotConnected)?
            .submit_code(code)
    }

    /// Cancel the in-flight pairing, if any
    pub fn cancel_pairing(&mut self) {
        if let Some(pairing) = self.pairing.take() {
            debug!(device = %pairing.device().id, "cancelling pairing");
            pairing.cancel();
        }
    }

    async fn record_error(&self, message: String) {
        *self.last_error.lock().expect("last error poisoned") = Some(message.clone());
        emit(&self.subscribers, ControllerEvent::Error { message }).await;
    }
}

async fn emit(subscribers: &Subscribers, event: ControllerEvent) {
    subscribers
        .write()
        .await
        .retain(|tx| tx.send(event.clone()).is_ok());
}

async fn forward_remote_events(
    mut event_rx: mpsc::UnboundedReceiver<RemoteEvent>,
    device_id: String,
    subscribers: Subscribers,
    last_error: Arc<Mutex<Option<String>>>,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            RemoteEvent::Connected => {
                emit(
                    &subscribers,
                    ControllerEvent::Connected {
                        device_id: device_id.clone(),
                    },
                )
                .await;
            }
            RemoteEvent::Disconnected { reason } => {
                if let Some(reason) = &reason {
                    *last_error.lock().expect("last error poisoned") = Some(reason.clone());
                }
                emit(
                    &subscribers,
                    ControllerEvent::Disconnected {
                        device_id: device_id.clone(),
                        reason,
                    },
                )
                .await;
                break;
            }
        }
    }
}

async fn forward_pairing_events(
    mut event_rx: mpsc::UnboundedReceiver<PairingEvent>,
    device: TVDevice,
    registry: Arc<RwLock<DeviceRegistry>>,
    subscribers: Subscribers,
    last_error: Arc<Mutex<Option<String>>>,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            PairingEvent::StateChanged { state } => {
                emit(
                    &subscribers,
                    ControllerEvent::PairingStateChanged {
                        device_id: device.id.clone(),
                        state,
                    },
                )
                .await;
            }
            PairingEvent::CodeRequired => {
                emit(
                    &subscribers,
                    ControllerEvent::PairingCodeRequired {
                        device_id: device.id.clone(),
                    },
                )
                .await;
            }
            PairingEvent::Succeeded => {
                let mut paired = device.clone();
                paired.paired = true;
                let add_result = registry.write().await.add(paired.clone());
                if let Err(e) = add_result {
                    *last_error.lock().expect("last error poisoned") = Some(e.to_string());
                    emit(
                        &subscribers,
                        ControllerEvent::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
                emit(&subscribers, ControllerEvent::DevicePaired { device: paired }).await;
                break;
            }
            PairingEvent::Failed { reason } => {
                *last_error.lock().expect("last error poisoned") = Some(reason.clone());
                emit(&subscribers, ControllerEvent::Error { message: reason }).await;
                break;
            }
            PairingEvent::Cancelled => break,
        }
    }
}
