//! TOML-based configuration for the pairline client.
//!
//! The default location is platform dependent:
//! - Windows:  `%APPDATA%\Pairline\client.toml`
//! - Linux:    `~/.config/pairline/client.toml`
//! - macOS:    `~/Library/Application Support/Pairline/client.toml`
//!
//! Example file:
//!
//! ```toml
//! host = "10.0.0.5"
//! port = 5555
//! ping_threshold_ms = 1000
//! loop_period_ms = 100
//! log_level = "info"
//!
//! [keepalive]
//! enabled = true
//! idle_secs = 5
//! interval_secs = 1
//! retries = 3
//! ```
//!
//! Every field carries a serde default, so a partial file (or no file at
//! all) still yields a usable configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Connection settings for one client session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or IP address of the peer.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port shared by the control and data channels.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Silence on the control channel longer than this marks the peer dead.
    /// Also bounds each handshake wait.
    #[serde(default = "default_ping_threshold_ms")]
    pub ping_threshold_ms: u64,
    /// How long one heartbeat iteration polls the control channel.
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// TCP keep-alive applied to the data channel.
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

/// TCP keep-alive probes for the data channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeepaliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Idle time before the first probe.
    #[serde(default = "default_keepalive_idle_secs")]
    pub idle_secs: u64,
    /// Time between probes.
    #[serde(default = "default_keepalive_interval_secs")]
    pub interval_secs: u64,
    /// Unanswered probes before the connection is dropped.
    #[serde(default = "default_keepalive_retries")]
    pub retries: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5555
}
fn default_ping_threshold_ms() -> u64 {
    1000
}
fn default_loop_period_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_keepalive_idle_secs() -> u64 {
    5
}
fn default_keepalive_interval_secs() -> u64 {
    1
}
fn default_keepalive_retries() -> u32 {
    3
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ping_threshold_ms: default_ping_threshold_ms(),
            loop_period_ms: default_loop_period_ms(),
            log_level: default_log_level(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            idle_secs: default_keepalive_idle_secs(),
            interval_secs: default_keepalive_interval_secs(),
            retries: default_keepalive_retries(),
        }
    }
}

impl ClientConfig {
    /// Default settings aimed at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn ping_threshold(&self) -> Duration {
        Duration::from_millis(self.ping_threshold_ms)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    /// Checks the ranges the session relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty host, a zero port, a zero
    /// loop period, a ping threshold that does not exceed the loop period, or
    /// zero keep-alive timings while keep-alive is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".into()));
        }
        if self.loop_period_ms == 0 {
            return Err(ConfigError::Invalid("loop_period_ms must be positive".into()));
        }
        if self.ping_threshold_ms <= self.loop_period_ms {
            return Err(ConfigError::Invalid(format!(
                "ping_threshold_ms ({}) must exceed loop_period_ms ({})",
                self.ping_threshold_ms, self.loop_period_ms
            )));
        }
        if self.keepalive.enabled && (self.keepalive.idle_secs == 0 || self.keepalive.interval_secs == 0)
        {
            return Err(ConfigError::Invalid(
                "keepalive idle_secs and interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl KeepaliveConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the client config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("client.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads a `ClientConfig` from `path`, returning `ClientConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the `pairline` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Pairline"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pairline"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Pairline")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
