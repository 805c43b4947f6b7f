//! Transport primitives shared by the handshake, the heartbeat, and the
//! data channel.
//!
//! - [`raw_send`] / [`raw_recv`] move fixed-size chunks and block until the
//!   whole chunk is written or read.
//! - [`wait_for_data`] is a readiness poll with a timeout.  A zero timeout
//!   answers "is something buffered right now" without waiting.
//! - [`connect_control`] / [`connect_with_keepalive`] open the two channels.
//!
//! # Why a raw peek? (for beginners)
//!
//! Tokio tracks socket readiness from OS events, and a freshly polled stream
//! may not have received its first event yet even though bytes are already
//! queued in the kernel.  [`wait_for_data`] therefore asks the kernel directly
//! with a non-blocking `MSG_PEEK` before it falls back to awaiting a
//! readiness event, so short and zero timeouts behave like `select()`.

use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::time::Duration;

use pairline_core::protocol::fixed_width;
use socket2::{SockRef, TcpKeepalive};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Interest};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::infrastructure::storage::config::KeepaliveConfig;

/// Errors raised by the fixed-size send/receive primitives.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side closed the connection.
    #[error("connection closed by peer")]
    ClosedByPeer,
    /// Any other I/O failure on an established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    pub(crate) fn from_io(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => Self::ClosedByPeer,
            _ => Self::Io(e),
        }
    }
}

/// Outcome of a single readiness poll.
#[derive(Debug)]
pub enum Readiness {
    /// Data (or an orderly close) is waiting; carries the time spent waiting.
    Ready(Duration),
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The poll itself failed.
    Error(io::Error),
}

/// Pads or truncates `bytes` to `size` and writes exactly `size` bytes.
///
/// # Errors
///
/// Returns [`TransportError::ClosedByPeer`] if the peer has gone away, or
/// [`TransportError::Io`] for other write failures.
pub async fn raw_send<W>(writer: &mut W, bytes: &[u8], size: usize) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let chunk = fixed_width(bytes, size);
    writer.write_all(&chunk).await.map_err(TransportError::from_io)?;
    writer.flush().await.map_err(TransportError::from_io)
}

/// Reads exactly `size` bytes, waiting as long as it takes.
///
/// # Errors
///
/// Returns [`TransportError::ClosedByPeer`] if the stream ends before `size`
/// bytes arrive, or [`TransportError::Io`] for other read failures.
pub async fn raw_recv<R>(reader: &mut R, size: usize) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; size];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(TransportError::from_io)?;
    Ok(buf)
}

/// Waits up to `timeout` for `stream` to become readable.
pub async fn wait_for_data(stream: &TcpStream, timeout: Duration) -> Readiness {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        match peek_now(stream) {
            Ok(_) => return Readiness::Ready(started.elapsed()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Readiness::Error(e),
        }

        match time::timeout_at(deadline, stream.readable()).await {
            Err(_) => return Readiness::TimedOut,
            Ok(Err(e)) => return Readiness::Error(e),
            Ok(Ok(())) => {}
        }

        // A WouldBlock here clears the stale readiness flag so the next
        // `readable()` waits for a fresh event.
        match stream.try_io(Interest::READABLE, || peek_now(stream)) {
            Ok(_) => return Readiness::Ready(started.elapsed()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => return Readiness::Error(e),
        }
    }
}

/// Non-blocking one-byte `MSG_PEEK`; `Ok(0)` means the peer closed.
fn peek_now(stream: &TcpStream) -> io::Result<usize> {
    let mut byte = [MaybeUninit::<u8>::uninit(); 1];
    SockRef::from(stream).peek(&mut byte)
}

/// Opens the control channel.
///
/// # Errors
///
/// Returns the I/O error of the last address tried.
pub async fn connect_control(host: &str, port: u16) -> io::Result<TcpStream> {
    debug!("connecting control channel to {host}:{port}");
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Opens the data channel from a socket whose keep-alive probes are set
/// before `connect`.
///
/// # Errors
///
/// Returns the I/O error of the last address tried, or the resolver error if
/// `host` does not resolve.
pub async fn connect_with_keepalive(
    host: &str,
    port: u16,
    keepalive: &KeepaliveConfig,
) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in lookup_host((host, port)).await? {
        debug!("connecting data channel to {addr}");
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        apply_keepalive(&socket, keepalive)?;

        match socket.connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            ErrorKind::AddrNotAvailable,
            format!("{host}:{port} resolved to no addresses"),
        )
    }))
}

fn apply_keepalive(socket: &TcpSocket, keepalive: &KeepaliveConfig) -> io::Result<()> {
    socket.set_keepalive(keepalive.enabled)?;
    if !keepalive.enabled {
        return Ok(());
    }

    let params = TcpKeepalive::new().with_time(keepalive.idle());
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "windows"
    ))]
    let params = params.with_interval(keepalive.interval());
    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd"
    ))]
    let params = params.with_retries(keepalive.retries);

    SockRef::from(socket).set_tcp_keepalive(&params)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
