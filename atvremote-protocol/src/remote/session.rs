//! Remote control session
//!
//! One persistent TLS connection to the TV's control port. After the
//! configure/set-active startup sequence, a connection task owns the stream:
//! it forwards key presses from a command channel and answers the TV's
//! pings, which is what keeps the TV from dropping the session.

use super::messages::{self, RemoteInbound};
use super::KeyCode;
use crate::device::TVDevice;
use crate::error::{RemoteError, Result};
use crate::identity::IdentityStore;
use crate::transport::TlsConnection;
use crate::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, trace, warn};

/// Gap between RemoteConfigure and RemoteSetActive. Some TVs discard
/// SetActive if Configure has not been handled yet, so this is load-bearing.
const CONFIGURE_SET_ACTIVE_DELAY: Duration = Duration::from_millis(500);

/// Events reported by a running session
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    Connected,
    Disconnected { reason: Option<String> },
}

enum SessionCommand {
    Key(KeyCode),
    Close,
}

/// Handle to an established control-channel session
pub struct RemoteSession {
    device: TVDevice,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RemoteSession {
    /// Connect to `device` and run the startup sequence.
    ///
    /// Returns once the session is active; the connection task keeps running
    /// in the background until [`disconnect`](Self::disconnect) or a
    /// transport error.
    pub async fn connect(
        device: TVDevice,
        identity_store: &IdentityStore,
        config: &ClientConfig,
        event_tx: mpsc::UnboundedSender<RemoteEvent>,
    ) -> Result<Self> {
        let identity = identity_store
            .get_or_create_identity()
            .map_err(|_| RemoteError::NoIdentity)?;

        let addr = device.control_addr();
        let mut conn = TlsConnection::connect(&addr, &identity).await?;

        conn.send_frame(&messages::remote_configure(config)).await?;
        tokio::time::sleep(CONFIGURE_SET_ACTIVE_DELAY).await;
        conn.send_frame(&messages::remote_set_active()).await?;

        info!(device = %device.id, "remote session active");
        let _ = event_tx.send(RemoteEvent::Connected);

        let connected = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            conn,
            command_rx,
            connected.clone(),
            event_tx,
            device.id.clone(),
        ));

        Ok(Self {
            device,
            command_tx,
            connected,
            task,
        })
    }

    pub fn device(&self) -> &TVDevice {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Inject a short key press.
    ///
    /// Silently ignored when the session has died; key presses are
    /// idempotent and the disconnect is reported through the event stream.
    pub fn send_command(&self, key: KeyCode) {
        if !self.is_connected() {
            debug!(key = %key, "dropping key press, session not connected");
            return;
        }
        let _ = self.command_tx.send(SessionCommand::Key(key));
    }

    /// Close the session and wait for the connection task to finish
    pub async fn disconnect(self) {
        let _ = self.command_tx.send(SessionCommand::Close);
        if self.task.await.is_err() {
            warn!(device = %self.device.id, "session task panicked during shutdown");
        }
    }
}

async fn run_session(
    mut conn: TlsConnection,
    mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<RemoteEvent>,
    device_id: String,
) {
    let reason = loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(SessionCommand::Key(key)) => {
                    debug!(device = %device_id, key = %key, "injecting key");
                    if let Err(e) = conn.send_frame(&messages::key_inject(key)).await {
                        break Some(e.to_string());
                    }
                }
                // None means every handle was dropped; treat as close
                Some(SessionCommand::Close) | None => break None,
            },
            frame = conn.read_frame() => match frame {
                Ok(frame) => {
                    if let Err(e) = dispatch(&mut conn, &frame, &device_id).await {
                        break Some(e.to_string());
                    }
                }
                Err(e) => {
                    warn!(device = %device_id, error = %e, "control channel read failed");
                    break Some(e.to_string());
                }
            },
        }
    };

    connected.store(false, Ordering::SeqCst);
    conn.close().await;
    info!(device = %device_id, ?reason, "remote session ended");
    let _ = event_tx.send(RemoteEvent::Disconnected { reason });
}

async fn dispatch(conn: &mut TlsConnection, frame: &[u8], device_id: &str) -> Result<()> {
    for inbound in messages::parse_frame(frame) {
        match inbound {
            RemoteInbound::Ping(value) => {
                trace!(device = %device_id, value, "ping");
                conn.send_frame(&messages::pong(value)).await?;
            }
            RemoteInbound::ConfigureAck
            | RemoteInbound::SetActiveAck
            | RemoteInbound::Start => {
                trace!(device = %device_id, ?inbound, "control message");
            }
            RemoteInbound::Unknown(field) => {
                trace!(device = %device_id, field, "unknown control field");
            }
        }
    }
    Ok(())
}
