//! Application layer use cases for the client application.
//!
//! - **`relay`** – Moves console lines to the peer and peer messages back to
//!   the console.  The transport is injected as a [`relay::MessageLink`], so
//!   this layer has no knowledge of sockets, handshakes, or heartbeats.

pub mod relay;
