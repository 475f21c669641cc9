//! Pairing session
//!
//! Drives the six-message handshake against the TV's pairing port. The
//! session runs as a task so the caller can cancel it or feed it the PIN at
//! any point; state is published through a watch channel and an event
//! stream.
//!
//! ```text
//! Idle → Connecting → (request/option/configuration) → WaitingForCode
//!                                                            │ submit_code
//!                                                            ▼
//!                                     Success ← ack ← Verifying
//! ```
//!
//! Any failure lands in `Failed` and tears the connection down; `cancel`
//! lands in `Idle`. The state graph is acyclic except through cancellation.

use super::events::PairingEvent;
use super::{messages, secret};
use crate::device::TVDevice;
use crate::error::{RemoteError, Result};
use crate::identity::IdentityStore;
use crate::transport::TlsConnection;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Ceiling on each wait for a pairing message
pub const MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pairing session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Connecting,
    WaitingForCode,
    Verifying,
    Success,
    Failed,
}

/// Handle to a running pairing session.
///
/// At most one session should exist at a time; starting a new one must
/// cancel the prior one (the controller enforces this, and dropping a
/// handle cancels its session as a backstop).
pub struct PairingSession {
    device: TVDevice,
    state_rx: watch::Receiver<PairingState>,
    code_tx: mpsc::UnboundedSender<String>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PairingSession {
    /// Start pairing against `device`, reporting progress on `event_tx`
    pub fn start(
        device: TVDevice,
        identity_store: Arc<IdentityStore>,
        client_name: String,
        event_tx: mpsc::UnboundedSender<PairingEvent>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(PairingState::Idle);
        let (code_tx, code_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let driver = Driver {
            device: device.clone(),
            identity_store,
            client_name,
            state_tx,
            event_tx,
            code_rx,
            cancel_rx,
        };
        let task = tokio::spawn(driver.run());

        Self {
            device,
            state_rx,
            code_tx,
            cancel_tx,
            task,
        }
    }

    pub fn device(&self) -> &TVDevice {
        &self.device
    }

    /// Current state, without blocking
    pub fn state(&self) -> PairingState {
        *self.state_rx.borrow()
    }

    /// Watch state transitions without polling
    pub fn watch_state(&self) -> watch::Receiver<PairingState> {
        self.state_rx.clone()
    }

    /// Feed the PIN shown on the TV into the session.
    ///
    /// Errors with [`RemoteError::NotConnected`] when the session already
    /// finished; validation and verification results arrive as events.
    pub fn submit_code(&self, code: &str) -> Result<()> {
        self.code_tx
            .send(code.to_string())
            .map_err(|_| RemoteError::NotConnected)
    }

    /// Cancel the session: tears down the connection and fails any
    /// outstanding wait with `ConnectionFailed("Cancelled")`
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PairingSession {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}

struct Driver {
    device: TVDevice,
    identity_store: Arc<IdentityStore>,
    client_name: String,
    state_tx: watch::Sender<PairingState>,
    event_tx: mpsc::UnboundedSender<PairingEvent>,
    code_rx: mpsc::UnboundedReceiver<String>,
    cancel_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn run(mut self) {
        match self.pair().await {
            Ok(()) => {
                info!(device = %self.device.id, "pairing succeeded");
                self.set_state(PairingState::Success);
                let _ = self.event_tx.send(PairingEvent::Succeeded);
            }
            Err(e) if e.is_cancelled() => {
                debug!(device = %self.device.id, "pairing cancelled");
                self.set_state(PairingState::Idle);
                let _ = self.event_tx.send(PairingEvent::Cancelled);
            }
            Err(e) => {
                warn!(device = %self.device.id, error = %e, "pairing failed");
                self.set_state(PairingState::Failed);
                let _ = self.event_tx.send(PairingEvent::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn pair(&mut self) -> Result<()> {
        self.set_state(PairingState::Connecting);

        let identity = self
            .identity_store
            .get_or_create_identity()
            .map_err(|_| RemoteError::NoIdentity)?;

        let addr = self.device.pairing_addr();
        let mut conn = self
            .cancellable(TlsConnection::connect(&addr, &identity))
            .await?;

        let result = self.handshake(&mut conn, identity.certificate_der()).await;
        conn.close().await;
        result
    }

    async fn handshake(&mut self, conn: &mut TlsConnection, client_cert: &[u8]) -> Result<()> {
        conn.send_frame(&messages::pairing_request(&self.client_name))
            .await?;
        let reply = self.wait_for_reply(conn).await?;
        if !reply.is_ok() {
            return Err(RemoteError::PairingRejected(reply.status));
        }

        conn.send_frame(&messages::pairing_option()).await?;

        // the configuration may ride along with the option ack or arrive
        // in a frame of its own
        let configuration = loop {
            let reply = self.wait_for_reply(conn).await?;
            if !reply.is_ok() {
                return Err(RemoteError::PairingRejected(reply.status));
            }
            if let Some((messages::FIELD_PAIRING_CONFIGURATION, payload)) = reply.payload {
                break payload;
            }
        };
        messages::validate_configuration(&configuration)?;

        self.set_state(PairingState::WaitingForCode);
        let _ = self.event_tx.send(PairingEvent::CodeRequired);
        let code = self.wait_for_code().await?;
        self.set_state(PairingState::Verifying);

        let code_bytes = secret::normalize_code(&code)?;
        let server_cert = conn
            .peer_certificate_der()
            .ok_or(RemoteError::ServerCertNotAvailable)?;
        let pairing_secret = secret::compute_secret(client_cert, &server_cert, &code_bytes)?;
        secret::check_code(&code_bytes, &pairing_secret)?;

        conn.send_frame(&messages::pairing_secret(&pairing_secret))
            .await?;
        let reply = self.wait_for_reply(conn).await?;
        if !reply.is_ok() {
            return Err(RemoteError::PairingRejected(reply.status));
        }

        Ok(())
    }

    /// Read the next envelope, bounded by [`MESSAGE_TIMEOUT`] and
    /// interruptible by cancellation
    async fn wait_for_reply(&self, conn: &mut TlsConnection) -> Result<messages::PairingReply> {
        let frame = self
            .cancellable(async {
                timeout(MESSAGE_TIMEOUT, conn.read_frame())
                    .await
                    .map_err(|_| RemoteError::Timeout)?
            })
            .await?;
        messages::parse_reply(&frame)
    }

    /// Wait for the user's PIN; no timeout, only cancellation
    async fn wait_for_code(&mut self) -> Result<String> {
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            _ = cancelled(&mut cancel_rx) => Err(RemoteError::cancelled()),
            code = self.code_rx.recv() => code.ok_or_else(RemoteError::cancelled),
        }
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            _ = cancelled(&mut cancel_rx) => Err(RemoteError::cancelled()),
            result = fut => result,
        }
    }

    fn set_state(&self, state: PairingState) {
        debug!(device = %self.device.id, ?state, "pairing state");
        let _ = self.state_tx.send(state);
        let _ = self.event_tx.send(PairingEvent::StateChanged { state });
    }
}

/// Resolves once cancellation is requested (or the handle is gone, which
/// only happens when the owning session was dropped)
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let _ = cancel_rx.wait_for(|&flag| flag).await;
}
