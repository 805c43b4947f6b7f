//! Block framing codec for data-channel messages.
//!
//! Wire format:
//! ```text
//! [full_blocks:21][part_size:21]            control header, 42 bytes
//! [block 0: 1024] ... [block n-1: 1024]     full_blocks blocks
//! [tail: part_size][terminator: 1]          final partial block
//! ```
//! Both header fields are NUL-padded decimal numbers (see
//! [`crate::protocol::numeric`]).  The payload is the message tokens joined
//! with a single space; it is cut into contiguous `BLOCK_SIZE` slices and the
//! remainder travels in the final block together with one NUL terminator.

use thiserror::Error;

use crate::protocol::numeric::{pad_numeric, parse_numeric, NUMERIC_WIDTH};

/// Size of one full block in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// Size of the control header: two numeric fields.
pub const HEADER_SIZE: usize = 2 * NUMERIC_WIDTH;

/// Byte appended to the final block and stripped on receipt.
pub const TERMINATOR: u8 = 0;

/// Separator placed between tokens in the payload.
pub const TOKEN_SEPARATOR: char = ' ';

/// Errors that can occur while encoding or decoding frames and fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A numeric field holds more digits than fit in a `u64`.
    #[error("numeric field overflows u64: {0:?}")]
    NumericOverflow(String),

    /// The header announces a final block that is not actually partial.
    #[error("partial block size {declared} must be smaller than the block size {BLOCK_SIZE}")]
    PartialBlockTooLarge { declared: u64 },

    /// The header announces more data than this platform can address.
    #[error("frame with {full_blocks} full blocks is too large")]
    FrameTooLarge { full_blocks: u64 },

    /// The reassembled payload is not UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The header arrived but the body did not follow in time.
    #[error("frame body did not arrive within {waited_ms} ms of its header")]
    TruncatedFrame { waited_ms: u64 },
}

/// The decoded control header of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Number of full `BLOCK_SIZE` blocks that follow the header.
    pub full_blocks: u64,
    /// Number of payload bytes in the final block, excluding the terminator.
    pub part_size: usize,
}

impl FrameHeader {
    /// Computes the header describing a payload of `payload_len` bytes.
    pub fn for_payload(payload_len: usize) -> Self {
        let full_blocks = payload_len / BLOCK_SIZE;
        Self {
            full_blocks: full_blocks as u64,
            part_size: payload_len - full_blocks * BLOCK_SIZE,
        }
    }

    /// Serialises the header into its 42-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..NUMERIC_WIDTH].copy_from_slice(&pad_numeric(self.full_blocks));
        buf[NUMERIC_WIDTH..].copy_from_slice(&pad_numeric(self.part_size as u64));
        buf
    }

    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the slice is too short, a field overflows,
    /// or the announced partial block is not smaller than [`BLOCK_SIZE`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let full_blocks = parse_numeric(&bytes[..NUMERIC_WIDTH])?;
        let part_size = parse_numeric(&bytes[NUMERIC_WIDTH..HEADER_SIZE])?;
        if part_size >= BLOCK_SIZE as u64 {
            return Err(ProtocolError::PartialBlockTooLarge {
                declared: part_size,
            });
        }

        Ok(Self {
            full_blocks,
            part_size: part_size as usize,
        })
    }

    /// Number of payload bytes the frame carries.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] if the size overflows `usize`.
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        usize::try_from(self.full_blocks)
            .ok()
            .and_then(|blocks| blocks.checked_mul(BLOCK_SIZE))
            .and_then(|full| full.checked_add(self.part_size))
            .ok_or(ProtocolError::FrameTooLarge {
                full_blocks: self.full_blocks,
            })
    }

    /// Size of the final block on the wire, terminator included.
    pub fn final_block_len(&self) -> usize {
        self.part_size + 1
    }
}

/// Joins tokens with the payload separator.
///
/// Empty tokens keep their position, so `["", "a"]` becomes `" a"`.  The one
/// list that cannot survive the wire is `[""]`: its payload is empty and
/// decodes as `[]`.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut payload = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            payload.push(TOKEN_SEPARATOR);
        }
        payload.push_str(token.as_ref());
    }
    payload
}

/// Encodes a token list into one complete frame.
///
/// Tokens must not contain the space separator; this is not checked.
///
/// # Examples
///
/// ```rust
/// use pairline_core::{decode_frame, encode_frame, HEADER_SIZE};
///
/// let bytes = encode_frame(&["ping", "1"]);
/// assert_eq!(bytes.len(), HEADER_SIZE + "ping 1".len() + 1);
///
/// let (tokens, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(tokens, vec!["ping", "1"]);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame<S: AsRef<str>>(tokens: &[S]) -> Vec<u8> {
    let payload = join_tokens(tokens);
    let payload = payload.as_bytes();
    let header = FrameHeader::for_payload(payload.len());

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + 1);
    buf.extend_from_slice(&header.encode());

    let full_blocks = header.full_blocks as usize;
    for i in 0..full_blocks {
        buf.extend_from_slice(&payload[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]);
    }
    buf.extend_from_slice(&payload[full_blocks * BLOCK_SIZE..]);
    buf.push(TERMINATOR);

    tracing::trace!(
        "encoded frame: {} payload bytes, {} full blocks, part {}",
        payload.len(),
        header.full_blocks,
        header.part_size
    );
    buf
}

/// Converts a reassembled payload (terminator already stripped) into tokens.
///
/// An empty payload decodes to an empty list.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidUtf8`] if the payload is not UTF-8.
pub fn decode_payload(payload: Vec<u8>) -> Result<Vec<String>, ProtocolError> {
    let text = String::from_utf8(payload).map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(text.split(TOKEN_SEPARATOR).map(str::to_owned).collect())
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the tokens and the total number of bytes consumed (header, blocks,
/// and terminator), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the header is malformed or `bytes` does not
/// hold the complete frame.
pub fn decode_frame(bytes: &[u8]) -> Result<(Vec<String>, usize), ProtocolError> {
    let header = FrameHeader::decode(bytes)?;
    let payload_len = header.payload_len()?;
    let total = payload_len
        .checked_add(HEADER_SIZE + 1)
        .ok_or(ProtocolError::FrameTooLarge {
            full_blocks: header.full_blocks,
        })?;

    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    // The terminator at `total - 1` is dropped.
    let payload = bytes[HEADER_SIZE..HEADER_SIZE + payload_len].to_vec();
    Ok((decode_payload(payload)?, total))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ping_scenario_matches_wire_layout() {
        // Arrange
        let tokens = ["ping", "1"];

        // Act
        let bytes = encode_frame(&tokens);

        // Assert – header (0, 6) then "ping 1" + terminator
        assert_eq!(bytes.len(), HEADER_SIZE + 7);
        assert_eq!(parse_numeric(&bytes[..NUMERIC_WIDTH]).unwrap(), 0);
        assert_eq!(parse_numeric(&bytes[NUMERIC_WIDTH..HEADER_SIZE]).unwrap(), 6);
        assert_eq!(&bytes[HEADER_SIZE..], b"ping 1\0");
    }

    #[test]
    fn test_encode_empty_message_has_zero_counts_and_terminator() {
        let tokens: [&str; 0] = [];

        let bytes = encode_frame(&tokens);

        assert_eq!(bytes.len(), HEADER_SIZE + 1);
        assert_eq!(
            FrameHeader::decode(&bytes).unwrap(),
            FrameHeader { full_blocks: 0, part_size: 0 }
        );
        assert_eq!(bytes[HEADER_SIZE], TERMINATOR);
    }

    #[test]
    fn test_header_for_exact_block_multiple_has_empty_final_block() {
        let header = FrameHeader::for_payload(2 * BLOCK_SIZE);

        assert_eq!(header.full_blocks, 2);
        assert_eq!(header.part_size, 0);
        assert_eq!(header.final_block_len(), 1);
    }

    #[test]
    fn test_multi_block_payload_is_sliced_contiguously() {
        // Arrange – distinct byte per block so misaligned slicing would show up
        let token: String = (0..(2 * BLOCK_SIZE + 10))
            .map(|i| char::from(b'a' + (i / BLOCK_SIZE) as u8))
            .collect();

        // Act
        let bytes = encode_frame(&[token.as_str()]);

        // Assert
        let first = &bytes[HEADER_SIZE..HEADER_SIZE + BLOCK_SIZE];
        let second = &bytes[HEADER_SIZE + BLOCK_SIZE..HEADER_SIZE + 2 * BLOCK_SIZE];
        assert!(first.iter().all(|&b| b == b'a'));
        assert!(second.iter().all(|&b| b == b'b'));
        assert_eq!(&bytes[HEADER_SIZE + 2 * BLOCK_SIZE..], b"cccccccccc\0");
    }

    #[test]
    fn test_decode_frame_reports_consumed_bytes_with_trailing_data() {
        let mut bytes = encode_frame(&["a", "b"]);
        let frame_len = bytes.len();
        bytes.extend_from_slice(b"next frame");

        let (tokens, consumed) = decode_frame(&bytes).unwrap();

        assert_eq!(tokens, vec!["a", "b"]);
        assert_eq!(consumed, frame_len);
    }

    #[test]
    fn test_decode_frame_incomplete_body_is_insufficient_data() {
        let bytes = encode_frame(&["hello", "world"]);

        let result = decode_frame(&bytes[..bytes.len() - 1]);

        assert!(matches!(result, Err(ProtocolError::InsufficientData { .. })));
    }

    #[test]
    fn test_header_decode_rejects_short_input() {
        let result = FrameHeader::decode(&[0u8; HEADER_SIZE - 1]);

        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: HEADER_SIZE - 1
            })
        );
    }

    #[test]
    fn test_header_decode_rejects_full_sized_partial_block() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[NUMERIC_WIDTH..].copy_from_slice(&pad_numeric(BLOCK_SIZE as u64));

        let result = FrameHeader::decode(&bytes);

        assert_eq!(
            result,
            Err(ProtocolError::PartialBlockTooLarge {
                declared: BLOCK_SIZE as u64
            })
        );
    }

    #[test]
    fn test_payload_len_overflow_is_frame_too_large() {
        let header = FrameHeader {
            full_blocks: u64::MAX,
            part_size: 0,
        };

        assert!(matches!(
            header.payload_len(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_payload_rejects_invalid_utf8() {
        let result = decode_payload(vec![0xFF, 0xFE]);

        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_join_tokens_single_space_separator() {
        assert_eq!(join_tokens(&["a", "bc", "d"]), "a bc d");
        assert_eq!(join_tokens::<&str>(&[]), "");
    }

    #[test]
    fn test_join_tokens_keeps_empty_tokens_in_place() {
        assert_eq!(join_tokens(&["", "a"]), " a");
        assert_eq!(join_tokens(&["a", "", "b"]), "a  b");
        assert_eq!(join_tokens(&["a", ""]), "a ");
    }
}
