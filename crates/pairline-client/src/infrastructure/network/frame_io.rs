//! Reading and writing whole frames on the data channel.
//!
//! The byte layout lives in [`pairline_core::protocol::codec`]; this module
//! only moves it over a stream.  Reading follows the wire structure: the
//! 42-byte header first, then each full block, then the final partial block
//! whose terminator is dropped.

use std::time::Duration;

use pairline_core::protocol::codec::{decode_payload, FrameHeader, BLOCK_SIZE, HEADER_SIZE};
use pairline_core::{encode_frame, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time;
use tracing::debug;

use super::transport::{raw_recv, TransportError};
use super::ClientError;

/// Encodes `tokens` and writes the complete frame.
///
/// # Errors
///
/// Returns [`TransportError`] if the write fails.
pub async fn write_frame<W, S>(writer: &mut W, tokens: &[S]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let frame = encode_frame(tokens);
    debug!("sending frame of {} bytes", frame.len());
    writer.write_all(&frame).await.map_err(TransportError::from_io)?;
    writer.flush().await.map_err(TransportError::from_io)
}

/// Reads one complete frame and returns its tokens.
///
/// The header read waits indefinitely (the caller has already seen the
/// channel become readable).  Every block after it must arrive within
/// `block_timeout`, otherwise the frame is reported as truncated.
///
/// Any error other than [`ProtocolError::InvalidUtf8`] leaves the stream at
/// an unknown offset; see [`leaves_stream_in_sync`].
///
/// # Errors
///
/// Returns [`ClientError::ProtocolViolation`] for a malformed header, a
/// stalled body, or a non-UTF-8 payload, and [`ClientError::Transport`] for
/// I/O failures.
pub async fn read_frame<R>(reader: &mut R, block_timeout: Duration) -> Result<Vec<String>, ClientError>
where
    R: AsyncRead + Unpin,
{
    let header_bytes = raw_recv(reader, HEADER_SIZE).await?;
    let header = FrameHeader::decode(&header_bytes)?;
    let payload_len = header.payload_len()?;
    debug!(
        "frame header: {} full blocks, {} byte tail",
        header.full_blocks, header.part_size
    );

    // Capped so a hostile header cannot force a huge allocation up front.
    let mut payload = Vec::with_capacity(payload_len.min(64 * BLOCK_SIZE));
    for _ in 0..header.full_blocks {
        payload.extend(recv_block(reader, BLOCK_SIZE, block_timeout).await?);
    }

    let mut tail = recv_block(reader, header.final_block_len(), block_timeout).await?;
    tail.pop();
    payload.extend(tail);

    Ok(decode_payload(payload)?)
}

/// `false` when a failed [`read_frame`] may have consumed part of a frame,
/// after which the next read would start in the middle of a payload.
pub fn leaves_stream_in_sync(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::ProtocolViolation(ProtocolError::InvalidUtf8(_))
    )
}

async fn recv_block<R>(reader: &mut R, size: usize, timeout: Duration) -> Result<Vec<u8>, ClientError>
where
    R: AsyncRead + Unpin,
{
    match time::timeout(timeout, raw_recv(reader, size)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProtocolError::TruncatedFrame {
            waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
        .into()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
