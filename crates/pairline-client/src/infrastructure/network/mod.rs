//! Network infrastructure for the client application.
//!
//! Architecture:
//! - [`PairlineClient`] owns the data channel, split into read and write
//!   halves so a `send` and a `receive` can run at the same time.
//! - The control channel belongs to the [`heartbeat::HeartbeatMonitor`] task
//!   once the handshake completes.
//! - `active` and `latency` are shared through [`heartbeat::SessionState`].
//!
//! ```text
//! connect ─> handshake::establish ─┬─ control ─> HeartbeatMonitor (task)
//!                                  └─ data ────> PairlineClient { reader, writer }
//! ```

pub mod frame_io;
pub mod handshake;
pub mod heartbeat;
pub mod transport;

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pairline_core::ProtocolError;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::relay::{MessageLink, RelayError};
use crate::infrastructure::storage::config::{ClientConfig, ConfigError};
use handshake::{establish, EstablishedSession};
use heartbeat::{HeartbeatExit, HeartbeatMonitor, SessionState};
use transport::{wait_for_data, Readiness, TransportError};

/// Handshake step that did not get a reply in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Waiting for the session token on the control channel.
    Token,
    /// Waiting for the readiness signal after the token was echoed.
    Signal,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Token => "token",
            Self::Signal => "signal",
        })
    }
}

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A TCP connection to the peer could not be opened.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The peer did not reply within the ping threshold during the handshake.
    #[error("handshake timed out waiting for {0}")]
    HandshakeTimeout(HandshakeStage),
    /// The peer refused the session.
    #[error("peer rejected the session")]
    PeerRejected,
    /// The peer is considered dead, or the session was stopped.
    #[error("peer disconnected")]
    PeerDisconnected,
    /// Availability was checked on a session that is no longer active.
    #[error("peer unavailable")]
    PeerUnavailable,
    /// The readiness poll failed while the peer still looked alive.
    #[error("readiness poll failed: {0}")]
    SelectError(#[source] io::Error),
    /// The peer broke the framing rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolError),
    /// I/O failure on an established channel.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The configuration cannot be used to connect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl ClientError {
    /// Folds a peer-side close into [`ClientError::PeerDisconnected`].
    fn disconnected_on_close(self) -> Self {
        match self {
            Self::Transport(TransportError::ClosedByPeer) => Self::PeerDisconnected,
            other => other,
        }
    }
}

/// A connected client session over a control and a data channel.
///
/// Created by [`PairlineClient::connect`]; a value of this type always holds
/// a session whose handshake succeeded.  Call [`PairlineClient::stop_client`]
/// to shut it down; dropping it without stopping aborts the heartbeat task.
pub struct PairlineClient {
    session_id: Uuid,
    ping_threshold: Duration,
    state: Arc<SessionState>,
    reader: tokio::sync::Mutex<Option<OwnedReadHalf>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl PairlineClient {
    /// Connects to `config.host:config.port`, runs the handshake, and starts
    /// the heartbeat monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for an unusable configuration,
    /// or the handshake failure.  No session or background task survives a
    /// failed call.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let session_id = Uuid::new_v4();

        let EstablishedSession { control, data } = establish(config, session_id).await?;

        let state = Arc::new(SessionState::new());
        let heartbeat = HeartbeatMonitor::new(
            control,
            Arc::clone(&state),
            config.ping_threshold(),
            config.loop_period(),
            session_id,
        )
        .spawn();
        let (reader, writer) = data.into_split();

        Ok(Self {
            session_id,
            ping_threshold: config.ping_threshold(),
            state,
            reader: tokio::sync::Mutex::new(Some(reader)),
            writer: tokio::sync::Mutex::new(Some(writer)),
            heartbeat: Mutex::new(Some(heartbeat)),
        })
    }

    /// Connects with the default ping threshold (1000 ms) and loop period (100 ms).
    ///
    /// # Errors
    ///
    /// See [`PairlineClient::connect`].
    pub async fn connect_to(host: impl Into<String>, port: u16) -> Result<Self, ClientError> {
        Self::connect(&ClientConfig::new(host, port)).await
    }

    /// Identifier attached to every log line of this session.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn ping_threshold(&self) -> Duration {
        self.ping_threshold
    }

    /// `true` while the session is active and the peer is considered alive.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Why the heartbeat monitor stopped, if it has.
    pub fn heartbeat_exit(&self) -> Option<HeartbeatExit> {
        self.state.heartbeat_exit()
    }

    /// Latest latency estimate in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PeerDisconnected`] once the peer is considered
    /// dead or the client has been stopped.
    pub fn get_ping(&self) -> Result<u64, ClientError> {
        self.state
            .live_latency_ms()
            .ok_or(ClientError::PeerDisconnected)
    }

    /// Checks without waiting whether a message is ready on the data channel.
    ///
    /// While a [`PairlineClient::receive`] is in flight the read half is
    /// busy; the check then reports `false` instead of waiting for it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::PeerUnavailable`] on a stopped session (the call
    ///   finishes the shutdown first).
    /// - [`ClientError::PeerDisconnected`] when nothing is ready and the peer
    ///   is dead, or the data channel was closed after a broken frame.
    /// - [`ClientError::SelectError`] if the poll fails on a live session.
    pub async fn is_available(&self) -> Result<bool, ClientError> {
        if !self.state.is_active() {
            self.stop_client().await;
            return Err(ClientError::PeerUnavailable);
        }

        let Ok(guard) = self.reader.try_lock() else {
            return if self.state.is_connected() {
                Ok(false)
            } else {
                Err(ClientError::PeerDisconnected)
            };
        };
        let reader = guard.as_ref().ok_or(ClientError::PeerDisconnected)?;
        let readiness = wait_for_data(stream_of(reader), Duration::ZERO).await;
        match readiness {
            Readiness::Ready(_) => Ok(true),
            Readiness::TimedOut if self.state.is_connected() => Ok(false),
            Readiness::TimedOut => Err(ClientError::PeerDisconnected),
            Readiness::Error(e) => Err(self.poll_failure(e)),
        }
    }

    /// Encodes `tokens` as one frame and writes it on the data channel.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::PeerDisconnected`] if the peer is not connected
    /// or closes the channel during the write.
    pub async fn send<S: AsRef<str>>(&self, tokens: &[S]) -> Result<(), ClientError> {
        if !self.state.is_connected() {
            return Err(ClientError::PeerDisconnected);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ClientError::PeerDisconnected)?;
        frame_io::write_frame(writer, tokens)
            .await
            .map_err(|e| ClientError::from(e).disconnected_on_close())
    }

    /// Waits up to `timeout` for a frame and returns its tokens.
    ///
    /// An empty list means nothing arrived in time.  Frames that were already
    /// buffered are still delivered after the peer has been declared dead.
    ///
    /// # Errors
    ///
    /// - [`ClientError::PeerDisconnected`] on a stopped session, or when
    ///   nothing arrives and the peer is dead.
    /// - [`ClientError::ProtocolViolation`] for a malformed or truncated frame.
    ///   Unless the frame was consumed whole, the data channel is closed and
    ///   the peer declared dead, so later calls fail with
    ///   [`ClientError::PeerDisconnected`].
    /// - [`ClientError::SelectError`] if the poll fails on a live session.
    pub async fn receive(&self, timeout: Duration) -> Result<Vec<String>, ClientError> {
        if !self.state.is_active() {
            return Err(ClientError::PeerDisconnected);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ClientError::PeerDisconnected)?;
        let readiness = wait_for_data(stream_of(reader), timeout).await;
        match readiness {
            Readiness::Ready(_) => {
                let result = frame_io::read_frame(reader, self.ping_threshold).await;
                match result {
                    Err(e) if !frame_io::leaves_stream_in_sync(&e) => {
                        guard.take();
                        warn!(session = %self.session_id, "data channel out of sync: {e}");
                        self.state.mark_dead(HeartbeatExit::DataChannel(e.to_string()));
                        Err(e.disconnected_on_close())
                    }
                    other => other,
                }
            }
            Readiness::TimedOut if self.state.is_connected() => Ok(Vec::new()),
            Readiness::TimedOut => Err(ClientError::PeerDisconnected),
            Readiness::Error(e) => Err(self.poll_failure(e)),
        }
    }

    /// Stops the session: clears `active`, waits for the heartbeat task, and
    /// closes both channels.  Calling it again is a no-op.
    pub async fn stop_client(&self) {
        let was_active = self.state.deactivate();

        let heartbeat = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = heartbeat {
            if let Err(e) = handle.await {
                warn!(session = %self.session_id, "heartbeat task ended abnormally: {e}");
            }
        }

        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(session = %self.session_id, "data channel shutdown: {e}");
            }
        }

        if was_active {
            info!(session = %self.session_id, "client stopped");
        }
    }

    fn poll_failure(&self, e: io::Error) -> ClientError {
        if self.state.is_connected() {
            ClientError::SelectError(e)
        } else {
            ClientError::PeerDisconnected
        }
    }
}

impl fmt::Debug for PairlineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairlineClient")
            .field("session_id", &self.session_id)
            .field("ping_threshold", &self.ping_threshold)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for PairlineClient {
    fn drop(&mut self) {
        if self.state.deactivate() {
            debug!(session = %self.session_id, "client dropped without stop_client");
        }
        let heartbeat = self
            .heartbeat
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = heartbeat {
            handle.abort();
        }
    }
}

#[async_trait]
impl MessageLink for PairlineClient {
    async fn send_message(&self, tokens: &[String]) -> Result<(), RelayError> {
        self.send(tokens).await.map_err(relay_error)
    }

    async fn receive_message(&self, timeout: Duration) -> Result<Vec<String>, RelayError> {
        self.receive(timeout).await.map_err(relay_error)
    }
}

fn relay_error(e: ClientError) -> RelayError {
    match e {
        ClientError::PeerDisconnected | ClientError::PeerUnavailable => {
            RelayError::LinkClosed(e.to_string())
        }
        other => RelayError::Link(other.to_string()),
    }
}

fn stream_of(half: &OwnedReadHalf) -> &TcpStream {
    half.as_ref()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
