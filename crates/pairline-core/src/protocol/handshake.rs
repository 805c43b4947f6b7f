//! Handshake vocabulary shared by both ends of a session.
//!
//! ```text
//! Client                                  Peer
//! ──────                                  ────
//! control: "0" (21 bytes)          ──>
//!                                  <──    control: token (21 bytes)
//! data:    token (21 bytes)        ──>
//!                                  <──    data: "1" (1 byte)  accept
//! ```
//!
//! A token whose numeric value is `0` is the peer's way of refusing the
//! session before the data channel is opened.

use std::fmt;

use crate::protocol::codec::ProtocolError;
use crate::protocol::numeric::{pad_numeric, parse_numeric, NUMERIC_WIDTH};

/// Value the client sends on the control channel to request a token.
pub const INIT_REQUEST: u64 = 0;

/// Value of the single-byte readiness signal that accepts the session.
pub const ACCEPT_SIGNAL: u64 = 1;

/// Width of the readiness signal on the data channel.
pub const SIGNAL_WIDTH: usize = 1;

/// Returns the padded placeholder that opens the control handshake.
pub fn init_request() -> [u8; NUMERIC_WIDTH] {
    pad_numeric(INIT_REQUEST)
}

/// Returns `true` if `signal` parses as the accept value.
pub fn is_accept_signal(signal: &[u8]) -> bool {
    matches!(parse_numeric(signal), Ok(ACCEPT_SIGNAL))
}

/// Opaque token issued by the peer to bind the data channel to the control
/// channel.
///
/// The raw bytes are kept exactly as received and echoed back verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    raw: [u8; NUMERIC_WIDTH],
}

impl SessionToken {
    /// Wraps the [`NUMERIC_WIDTH`] bytes read from the control channel.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] if `bytes` has the wrong length.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw: [u8; NUMERIC_WIDTH] =
            bytes
                .try_into()
                .map_err(|_| ProtocolError::InsufficientData {
                    needed: NUMERIC_WIDTH,
                    available: bytes.len(),
                })?;
        Ok(Self { raw })
    }

    /// The bytes to send back on the data channel.
    pub fn as_bytes(&self) -> &[u8; NUMERIC_WIDTH] {
        &self.raw
    }

    /// Numeric value of the token.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NumericOverflow`] if the digits overflow `u64`.
    pub fn value(&self) -> Result<u64, ProtocolError> {
        parse_numeric(&self.raw)
    }

    /// `true` when the peer answered with the termination value instead of a token.
    pub fn is_termination(&self) -> bool {
        matches!(self.value(), Ok(0))
    }
}

impl fmt::Debug for SessionToken {
    // The token authenticates the data channel; keep it out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_request_is_padded_zero() {
        let request = init_request();

        assert_eq!(request[0], b'0');
        assert!(request[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_token_round_trips_raw_bytes() {
        // Arrange
        let wire = pad_numeric(4242);

        // Act
        let token = SessionToken::from_wire(&wire).unwrap();

        // Assert
        assert_eq!(token.as_bytes(), &wire);
        assert_eq!(token.value().unwrap(), 4242);
        assert!(!token.is_termination());
    }

    #[test]
    fn test_zero_token_is_termination() {
        let token = SessionToken::from_wire(&pad_numeric(0)).unwrap();

        assert!(token.is_termination());
    }

    #[test]
    fn test_token_from_wire_rejects_wrong_length() {
        let result = SessionToken::from_wire(b"42");

        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: NUMERIC_WIDTH,
                available: 2
            })
        );
    }

    #[test]
    fn test_token_debug_does_not_leak_value() {
        let token = SessionToken::from_wire(&pad_numeric(987654)).unwrap();

        assert!(!format!("{token:?}").contains("987654"));
    }

    #[test]
    fn test_accept_signal_only_one() {
        assert!(is_accept_signal(b"1"));
        assert!(!is_accept_signal(b"0"));
        assert!(!is_accept_signal(b"\0"));
        assert!(!is_accept_signal(b"x"));
    }
}
