//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pairline_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – The two TCP channels: handshake, heartbeat monitor,
//!   block-framed data exchange, and the [`network::PairlineClient`] facade.
//!
//! - **`storage`** – TOML configuration file loading and saving.

pub mod network;
pub mod storage;
