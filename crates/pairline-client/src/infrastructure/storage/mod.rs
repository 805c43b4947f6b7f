//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the client's TOML configuration from an
//! explicit path or from the platform-appropriate directory, and falls back
//! to defaults when no file exists yet.

pub mod config;
