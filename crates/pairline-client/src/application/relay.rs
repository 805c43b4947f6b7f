//! RelayUseCase: moves text lines between a local console and a message link.
//!
//! Outbound, each non-blank input line is split on whitespace and sent as one
//! message.  Inbound, every received message is written back as its tokens
//! joined by a single space.  The link itself is injected through the
//! [`MessageLink`] trait, so the use case never touches a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Error type for the relay use case.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The link is gone for good; the session must be discarded.
    #[error("link closed: {0}")]
    LinkClosed(String),
    /// A single operation on the link failed.
    #[error("link error: {0}")]
    Link(String),
    /// Reading input or writing output failed.
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bidirectional message channel to the peer.
///
/// The infrastructure implementation is the network client; tests use an
/// in-memory recorder.
#[async_trait]
pub trait MessageLink: Send + Sync {
    /// Sends one message.
    async fn send_message(&self, tokens: &[String]) -> Result<(), RelayError>;

    /// Waits up to `timeout` for one message; an empty list means none arrived.
    async fn receive_message(&self, timeout: Duration) -> Result<Vec<String>, RelayError>;
}

/// Splits a console line into message tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

/// Relays console lines to the link and link messages to the console.
pub struct RelayUseCase<L: MessageLink> {
    link: Arc<L>,
    poll_interval: Duration,
}

impl<L: MessageLink> RelayUseCase<L> {
    /// Creates a relay that polls the link for at most `poll_interval` per
    /// receive attempt.
    pub fn new(link: Arc<L>, poll_interval: Duration) -> Self {
        Self { link, poll_interval }
    }

    /// Sends every non-blank line of `input` until EOF.
    ///
    /// Returns the number of messages sent.
    ///
    /// # Errors
    ///
    /// Stops at the first failed read or send.
    pub async fn forward_lines<R>(&self, input: R) -> Result<usize, RelayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut sent = 0;

        while let Some(line) = lines.next_line().await? {
            let tokens = tokenize(&line);
            if tokens.is_empty() {
                continue;
            }
            self.link.send_message(&tokens).await?;
            sent += 1;
            debug!("relayed {} tokens to peer", tokens.len());
        }

        info!("input closed after {sent} messages");
        Ok(sent)
    }

    /// Writes incoming messages to `output` while `running` is set.
    ///
    /// Returns the number of messages written.
    ///
    /// # Errors
    ///
    /// Stops at the first failed receive or write.
    pub async fn deliver_incoming<W>(&self, output: &mut W, running: &AtomicBool) -> Result<usize, RelayError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut delivered = 0;

        while running.load(Ordering::Relaxed) {
            let tokens = self.link.receive_message(self.poll_interval).await?;
            if tokens.is_empty() {
                continue;
            }
            let mut line = tokens.join(" ");
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
            delivered += 1;
        }

        Ok(delivered)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
