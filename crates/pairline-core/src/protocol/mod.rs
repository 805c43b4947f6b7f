//! Protocol module containing the fixed-width field helpers, the block
//! framing codec, and the handshake vocabulary.

pub mod codec;
pub mod handshake;
pub mod numeric;

pub use codec::{decode_frame, decode_payload, encode_frame, FrameHeader, ProtocolError};
pub use handshake::SessionToken;
pub use numeric::{fixed_width, pad_numeric, parse_numeric, NUMERIC_WIDTH};
