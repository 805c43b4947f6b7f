//! Heartbeat monitor and the liveness state it shares with the client.
//!
//! Once per iteration the monitor polls the control channel for up to one
//! loop period.  The peer periodically sends the latency it last observed;
//! the monitor adopts that value and answers with the local processing delay
//! (time between the report arriving and the reply leaving):
//!
//! ```text
//! Peer                                   Client (monitor)
//! ────                                   ────────────────
//! latency report (21 bytes)        ──>   latency := report
//!                                  <──   processing delay (21 bytes)
//! ```
//!
//! If nothing arrives for longer than the ping threshold, or the channel
//! fails, the monitor sets the latency to [`DISCONNECTED`] and exits.  It
//! never revives a dead session, and it also exits once the client has
//! declared the peer dead for a data-channel failure.  The first recorded
//! exit cause is kept.
//!
//! # Locking
//!
//! [`SessionState`] keeps `active`, `latency`, and the exit cause behind one
//! `std::sync::Mutex`.  Every critical section is a handful of field reads or
//! writes; no guard ever lives across an `.await`, so socket I/O never runs
//! under the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pairline_core::{pad_numeric, parse_numeric, NUMERIC_WIDTH};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::transport::{raw_recv, raw_send, wait_for_data, Readiness, TransportError};

/// Latency sentinel meaning "peer considered dead".
pub const DISCONNECTED: i64 = -1;

/// Why the heartbeat monitor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// `stop_client` cleared the active flag.
    Stopped,
    /// The data channel lost frame sync; recorded by the client.
    DataChannel(String),
    /// No report arrived for longer than the ping threshold.
    Silence { silent_for: Duration },
    /// The peer closed the control channel.
    ClosedByPeer,
    /// The readiness poll or a read/write failed.
    ChannelError(String),
    /// The peer sent a report that is not a valid number.
    Protocol(String),
}

impl From<TransportError> for HeartbeatExit {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::ClosedByPeer => Self::ClosedByPeer,
            TransportError::Io(e) => Self::ChannelError(e.to_string()),
        }
    }
}

#[derive(Debug)]
struct Liveness {
    active: bool,
    latency_ms: i64,
    exit: Option<HeartbeatExit>,
}

/// State shared between the client facade and its heartbeat task.
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<Liveness>,
}

impl SessionState {
    /// A freshly established session: active, latency 0.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Liveness {
                active: true,
                latency_ms: 0,
                exit: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Liveness> {
        // The fields stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn latency_ms(&self) -> i64 {
        self.lock().latency_ms
    }

    /// `true` while the session is active and the peer is considered alive.
    pub fn is_connected(&self) -> bool {
        let guard = self.lock();
        guard.active && guard.latency_ms >= 0
    }

    /// Current latency if the session is active and the peer alive.
    pub fn live_latency_ms(&self) -> Option<u64> {
        let guard = self.lock();
        if guard.active {
            u64::try_from(guard.latency_ms).ok()
        } else {
            None
        }
    }

    /// Clears the active flag; returns whether it was set.
    pub fn deactivate(&self) -> bool {
        std::mem::replace(&mut self.lock().active, false)
    }

    /// Adopts a latency report unless the peer was already declared dead.
    pub fn record_latency(&self, latency_ms: i64) {
        let mut guard = self.lock();
        if guard.latency_ms != DISCONNECTED {
            guard.latency_ms = latency_ms.max(0);
        }
    }

    /// Declares the peer dead and records why, unless a cause is already set.
    pub fn mark_dead(&self, exit: HeartbeatExit) {
        let mut guard = self.lock();
        guard.latency_ms = DISCONNECTED;
        guard.exit.get_or_insert(exit);
    }

    fn record_exit(&self, exit: HeartbeatExit) {
        self.lock().exit.get_or_insert(exit);
    }

    /// Why the heartbeat stopped, once it has.
    pub fn heartbeat_exit(&self) -> Option<HeartbeatExit> {
        self.lock().exit.clone()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that owns the control channel after the handshake.
pub struct HeartbeatMonitor {
    control: TcpStream,
    state: Arc<SessionState>,
    ping_threshold: Duration,
    loop_period: Duration,
    session_id: Uuid,
}

impl HeartbeatMonitor {
    pub fn new(
        control: TcpStream,
        state: Arc<SessionState>,
        ping_threshold: Duration,
        loop_period: Duration,
        session_id: Uuid,
    ) -> Self {
        Self {
            control,
            state,
            ping_threshold,
            loop_period,
            session_id,
        }
    }

    /// Starts the monitor; the control channel closes when the task ends.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!(session = %self.session_id, "heartbeat loop started");
        let exit = self.run_loop().await;

        if exit == HeartbeatExit::Stopped {
            debug!(session = %self.session_id, "heartbeat loop stopped");
            self.state.record_exit(exit);
        } else {
            warn!(session = %self.session_id, "peer considered disconnected: {exit:?}");
            self.state.mark_dead(exit);
        }
    }

    async fn run_loop(&mut self) -> HeartbeatExit {
        let mut last_contact = Instant::now();

        loop {
            let loop_start = Instant::now();
            let readiness = wait_for_data(&self.control, self.loop_period).await;

            if !self.state.is_connected() {
                return HeartbeatExit::Stopped;
            }

            match readiness {
                Readiness::Error(e) => return HeartbeatExit::ChannelError(e.to_string()),
                Readiness::TimedOut => {
                    let silent_for = last_contact.elapsed();
                    if silent_for > self.ping_threshold {
                        return HeartbeatExit::Silence { silent_for };
                    }
                }
                Readiness::Ready(waited) => {
                    if let Err(exit) = self.exchange(loop_start + waited).await {
                        return exit;
                    }
                    last_contact = Instant::now();
                }
            }
        }
    }

    /// Reads one latency report and answers with the processing delay since
    /// `received_at`.
    async fn exchange(&mut self, received_at: Instant) -> Result<(), HeartbeatExit> {
        let report = raw_recv(&mut self.control, NUMERIC_WIDTH).await?;
        let latency = parse_numeric(&report).map_err(|e| HeartbeatExit::Protocol(e.to_string()))?;
        self.state
            .record_latency(i64::try_from(latency).unwrap_or(i64::MAX));

        let delay_ms = u64::try_from(received_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        raw_send(&mut self.control, &pad_numeric(delay_ms), NUMERIC_WIDTH).await?;

        trace!(session = %self.session_id, "heartbeat: latency {latency} ms, delay {delay_ms} ms");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_state_is_connected_with_zero_latency() {
        // Arrange / Act
        let state = SessionState::new();

        // Assert
        assert!(state.is_active());
        assert!(state.is_connected());
        assert_eq!(state.latency_ms(), 0);
        assert!(state.heartbeat_exit().is_none());
    }

    #[test]
    fn test_deactivate_returns_true_only_once() {
        let state = SessionState::new();

        assert!(state.deactivate());
        assert!(!state.deactivate());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_mark_dead_sets_sentinel_and_exit() {
        let state = SessionState::new();

        state.mark_dead(HeartbeatExit::ClosedByPeer);

        assert_eq!(state.latency_ms(), DISCONNECTED);
        assert!(!state.is_connected());
        assert_eq!(state.heartbeat_exit(), Some(HeartbeatExit::ClosedByPeer));
    }

    #[test]
    fn test_record_latency_never_revives_dead_peer() {
        // Arrange
        let state = SessionState::new();
        state.mark_dead(HeartbeatExit::Silence {
            silent_for: Duration::from_secs(2),
        });

        // Act
        state.record_latency(15);

        // Assert
        assert_eq!(state.latency_ms(), DISCONNECTED);
    }

    #[test]
    fn test_first_exit_cause_is_kept() {
        // Arrange
        let state = SessionState::new();
        state.mark_dead(HeartbeatExit::DataChannel("truncated frame".into()));

        // Act
        state.mark_dead(HeartbeatExit::ClosedByPeer);
        state.record_exit(HeartbeatExit::Stopped);

        // Assert
        assert_eq!(
            state.heartbeat_exit(),
            Some(HeartbeatExit::DataChannel("truncated frame".into()))
        );
    }

    #[test]
    fn test_record_latency_updates_live_peer() {
        let state = SessionState::new();

        state.record_latency(23);

        assert_eq!(state.latency_ms(), 23);
    }

    #[test]
    fn test_inactive_session_is_not_connected_even_with_latency() {
        let state = SessionState::new();
        state.record_latency(5);

        state.deactivate();

        assert!(!state.is_connected());
        assert_eq!(state.latency_ms(), 5);
        assert_eq!(state.live_latency_ms(), None);
    }

    #[test]
    fn test_live_latency_reports_only_for_live_peer() {
        let state = SessionState::new();
        state.record_latency(12);
        assert_eq!(state.live_latency_ms(), Some(12));

        state.mark_dead(HeartbeatExit::ClosedByPeer);

        assert_eq!(state.live_latency_ms(), None);
    }

    #[test]
    fn test_transport_errors_map_to_exit_causes() {
        assert_eq!(
            HeartbeatExit::from(TransportError::ClosedByPeer),
            HeartbeatExit::ClosedByPeer
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(matches!(
            HeartbeatExit::from(TransportError::Io(io)),
            HeartbeatExit::ChannelError(msg) if msg.contains("boom")
        ));
    }
}
