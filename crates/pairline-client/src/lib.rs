//! pairline-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does pairline-client do? (for beginners)
//!
//! The client talks to a peer over **two** TCP connections to the same
//! address:
//!
//! 1. The *control* channel carries the handshake token request and, once
//!    the session is up, a periodic heartbeat from which the client learns
//!    its current latency and whether the peer is still alive.
//! 2. The *data* channel carries application messages.  A message is a list
//!    of text tokens, sent as a block-framed payload (see `pairline_core`).
//!
//! ```no_run
//! # async fn demo() -> Result<(), pairline_client::ClientError> {
//! use std::time::Duration;
//! use pairline_client::PairlineClient;
//!
//! let client = PairlineClient::connect_to("127.0.0.1", 5555).await?;
//! client.send(&["ping", "1"]).await?;
//! let reply = client.receive(Duration::from_millis(500)).await?;
//! println!("{reply:?}, ping {} ms", client.get_ping()?);
//! client.stop_client().await;
//! # Ok(())
//! # }
//! ```

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: network channels and configuration storage.
pub mod infrastructure;

pub use infrastructure::network::heartbeat::HeartbeatExit;
pub use infrastructure::network::{ClientError, HandshakeStage, PairlineClient};
pub use infrastructure::storage::config::{ClientConfig, ConfigError, KeepaliveConfig};
