//! Session establishment: opens both channels and runs the token exchange.
//!
//! The sequence fails fast.  Any error after a channel has been opened drops
//! the streams it owns, which closes them; no background task exists yet, so
//! nothing else needs to be torn down.

use pairline_core::protocol::handshake::{init_request, is_accept_signal, SIGNAL_WIDTH};
use pairline_core::{SessionToken, NUMERIC_WIDTH};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::{connect_control, connect_with_keepalive, raw_recv, raw_send, wait_for_data, Readiness};
use super::{ClientError, HandshakeStage};
use crate::infrastructure::storage::config::ClientConfig;

/// Both channels of a session whose handshake succeeded.
#[derive(Debug)]
pub struct EstablishedSession {
    pub control: TcpStream,
    pub data: TcpStream,
}

/// Runs the full handshake against `config.host:config.port`.
///
/// # Errors
///
/// - [`ClientError::ConnectFailed`] if either channel cannot be opened.
/// - [`ClientError::HandshakeTimeout`] if the token or the readiness signal
///   does not arrive within the ping threshold.
/// - [`ClientError::PeerRejected`] if the peer answers with the termination
///   token or a readiness signal other than `1`.
/// - [`ClientError::Transport`] if a channel fails mid-exchange.
pub async fn establish(config: &ClientConfig, session_id: Uuid) -> Result<EstablishedSession, ClientError> {
    let addr = format!("{}:{}", config.host, config.port);
    let threshold = config.ping_threshold();

    let mut control = connect_control(&config.host, config.port)
        .await
        .map_err(|source| ClientError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;
    debug!(session = %session_id, "control channel open to {addr}");

    raw_send(&mut control, &init_request(), NUMERIC_WIDTH).await?;
    await_reply(&control, threshold, HandshakeStage::Token).await?;

    let token = SessionToken::from_wire(&raw_recv(&mut control, NUMERIC_WIDTH).await?)?;
    if token.is_termination() {
        warn!(session = %session_id, "peer answered the token request with termination");
        return Err(ClientError::PeerRejected);
    }
    debug!(session = %session_id, "received session token");

    let mut data = connect_with_keepalive(&config.host, config.port, &config.keepalive)
        .await
        .map_err(|source| ClientError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;
    debug!(session = %session_id, "data channel open to {addr}");

    raw_send(&mut data, token.as_bytes(), NUMERIC_WIDTH).await?;
    await_reply(&data, threshold, HandshakeStage::Signal).await?;

    let signal = raw_recv(&mut data, SIGNAL_WIDTH).await?;
    if !is_accept_signal(&signal) {
        warn!(session = %session_id, "peer rejected the session (signal {:?})", signal);
        return Err(ClientError::PeerRejected);
    }

    info!(session = %session_id, "session established with {addr}");
    Ok(EstablishedSession { control, data })
}

async fn await_reply(
    stream: &TcpStream,
    threshold: std::time::Duration,
    stage: HandshakeStage,
) -> Result<(), ClientError> {
    match wait_for_data(stream, threshold).await {
        Readiness::Ready(waited) => {
            debug!("{stage} reply after {} ms", waited.as_millis());
            Ok(())
        }
        Readiness::TimedOut => Err(ClientError::HandshakeTimeout(stage)),
        Readiness::Error(e) => Err(ClientError::SelectError(e)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
