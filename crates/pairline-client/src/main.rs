//! pairline-client entry point.
//!
//! Loads the configuration, connects, and relays between the console and the
//! peer until stdin closes, the peer goes away, or Ctrl-C is pressed.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                 -- TOML file or defaults
//!  └─ PairlineClient::connect()     -- handshake + heartbeat task
//!  └─ relay
//!       ├─ stdin lines  -> RelayUseCase::forward_lines    -> send
//!       ├─ receive      -> RelayUseCase::deliver_incoming -> stdout
//!       └─ ping ticker  -> debug log
//!  └─ stop_client()
//! ```
//!
//! Usage: `pairline-client [CONFIG_PATH]`.  Without a path the platform
//! default (`<config dir>/pairline/client.toml`) is used; a missing file
//! means defaults.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pairline_client::application::relay::RelayUseCase;
use pairline_client::infrastructure::storage::config::{default_config_path, load_config};
use pairline_client::PairlineClient;

const PING_REPORT_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    let result = runtime.block_on(run());
    // A pending stdin read parks a blocking thread that only returns on input.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run() -> anyhow::Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("pairline client starting ({})", config_path.display());

    let client = Arc::new(
        PairlineClient::connect(&config)
            .await
            .with_context(|| format!("failed to connect to {}:{}", config.host, config.port))?,
    );
    info!(session = %client.session_id(), "connected to {}:{}", config.host, config.port);

    // Shutdown flag.
    let running = Arc::new(AtomicBool::new(true));
    let relay = Arc::new(RelayUseCase::new(Arc::clone(&client), config.loop_period()));

    // ── Ping reporter ─────────────────────────────────────────────────────────
    let ping_task = {
        let client = Arc::clone(&client);
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PING_REPORT_INTERVAL);
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                match client.get_ping() {
                    Ok(ms) => debug!("ping {ms} ms"),
                    Err(e) => {
                        warn!("ping unavailable: {e}");
                        break;
                    }
                }
            }
        })
    };

    // ── Inbound messages ──────────────────────────────────────────────────────
    let mut inbound = {
        let relay = Arc::clone(&relay);
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            relay.deliver_incoming(&mut stdout, &running).await
        })
    };

    // ── Outbound lines until something ends the session ───────────────────────
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = relay.forward_lines(stdin) => match result {
            Ok(sent) => info!("stdin closed; {sent} messages sent"),
            Err(e) => error!("sending failed: {e}"),
        },
        result = &mut inbound => match result {
            Ok(Ok(received)) => info!("receiver stopped after {received} messages"),
            Ok(Err(e)) => error!("receiving failed: {e}"),
            Err(e) => error!("receiver task failed: {e}"),
        },
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    running.store(false, Ordering::Relaxed);
    client.stop_client().await;
    inbound.abort();
    ping_task.abort();

    if let Some(exit) = client.heartbeat_exit() {
        debug!("heartbeat exit: {exit:?}");
    }
    info!("pairline client stopped");
    Ok(())
}
