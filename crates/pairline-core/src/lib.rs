//! # pairline-core
//!
//! Shared protocol library for pairline containing the fixed-width numeric
//! field helpers, the block framing codec, and the handshake token type.
//!
//! This crate has zero dependencies on sockets or an async runtime: every
//! function works on byte slices.  The client crate layers the actual reads
//! and writes on top of it.
//!
//! # Protocol overview (for beginners)
//!
//! A pairline session uses **two** TCP connections to the same peer:
//!
//! - the *control* channel carries the handshake token and, afterwards, a
//!   periodic heartbeat exchange used to measure liveness;
//! - the *data* channel carries application messages.
//!
//! Every number on the wire is written as ASCII digits padded with NUL bytes
//! to a fixed width of 21 bytes ([`NUMERIC_WIDTH`]).  Application messages are
//! flat lists of string tokens which are joined with single spaces and split
//! into 1024-byte blocks ([`BLOCK_SIZE`]) behind a 42-byte header.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `pairline_core::encode_frame` instead of `pairline_core::protocol::codec::encode_frame`.
pub use protocol::codec::{
    decode_frame, decode_payload, encode_frame, FrameHeader, ProtocolError, BLOCK_SIZE,
    HEADER_SIZE,
};
pub use protocol::handshake::SessionToken;
pub use protocol::numeric::{pad_numeric, parse_numeric, NUMERIC_WIDTH};
