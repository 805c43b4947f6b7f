//! Fixed-width numeric fields.
//!
//! Every count, token, and heartbeat value on the wire is an unsigned integer
//! written as ASCII digits and right-padded with NUL bytes to
//! [`NUMERIC_WIDTH`] bytes:
//!
//! ```text
//! "4242" -> [b'4', b'2', b'4', b'2', 0, 0, 0, ... 0]   (21 bytes)
//! ```
//!
//! Decoding scans the leading digits and stops at the first byte that is not
//! an ASCII digit, so the padding (or any trailing garbage) is ignored.

use crate::protocol::codec::ProtocolError;

/// Width of every numeric field: the 20 digits of `u64::MAX` plus one terminator.
pub const NUMERIC_WIDTH: usize = 21;

/// Pads or truncates `bytes` to exactly `size` bytes, filling with NUL.
///
/// # Examples
///
/// ```rust
/// use pairline_core::protocol::fixed_width;
///
/// assert_eq!(fixed_width(b"ab", 4), b"ab\0\0".to_vec());
/// assert_eq!(fixed_width(b"abcdef", 3), b"abc".to_vec());
/// ```
pub fn fixed_width(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    let n = bytes.len().min(size);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Encodes `value` as a NUL-padded decimal field of [`NUMERIC_WIDTH`] bytes.
///
/// # Examples
///
/// ```rust
/// use pairline_core::{pad_numeric, parse_numeric};
///
/// let field = pad_numeric(4242);
/// assert_eq!(&field[..5], b"4242\0");
/// assert_eq!(parse_numeric(&field).unwrap(), 4242);
/// ```
pub fn pad_numeric(value: u64) -> [u8; NUMERIC_WIDTH] {
    let digits = value.to_string();
    let mut field = [0u8; NUMERIC_WIDTH];
    // u64::MAX has 20 digits, so the digits always fit with room for a NUL.
    field[..digits.len()].copy_from_slice(digits.as_bytes());
    field
}

/// Parses the leading ASCII digits of `field`.
///
/// An empty digit run parses as `0`, matching how the peer treats an
/// all-padding field.
///
/// # Errors
///
/// Returns [`ProtocolError::NumericOverflow`] if the digit run does not fit
/// in a `u64`.
pub fn parse_numeric(field: &[u8]) -> Result<u64, ProtocolError> {
    let mut value: u64 = 0;
    for &byte in field.iter().take_while(|b| b.is_ascii_digit()) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| {
                ProtocolError::NumericOverflow(String::from_utf8_lossy(field).into_owned())
            })?;
    }
    Ok(value)
}
