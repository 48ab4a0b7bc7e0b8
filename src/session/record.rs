use chrono::{DateTime, Local};
use getset::{CopyGetters, Getters};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[atomic_enum::atomic_enum]
#[derive(PartialEq)]
pub enum SessionState {
    Classifying = 0,
    Trapping,
    Probing,
    Rejecting,
    Closed,
}

/// What the client asked for, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RequestSummary {
    method: String,
    path: String,
    user_agent: String,
}

impl RequestSummary {
    pub fn new(method: String, path: String, user_agent: String) -> Self {
        Self {
            method,
            path,
            user_agent,
        }
    }
}

/// One live connection.
#[derive(Debug, Getters, CopyGetters)]
pub struct Session {
    #[getset(get_copy = "pub")]
    peer: SocketAddr,
    #[getset(get = "pub")]
    connection_time: DateTime<Local>,
    started: Instant,
    /// Assigned once at creation, never changes.
    #[getset(get_copy = "pub")]
    display_row: u32,
    #[getset(get = "pub")]
    request: RequestSummary,
    bytes_transferred: AtomicU64,
    alive: AtomicBool,
    state: AtomicSessionState,
}

impl Session {
    pub(crate) fn new(peer: SocketAddr, display_row: u32, request: RequestSummary) -> Self {
        Self {
            peer,
            connection_time: Local::now(),
            started: Instant::now(),
            display_row,
            request,
            bytes_transferred: AtomicU64::new(0),
            alive: AtomicBool::new(true),
            state: AtomicSessionState::new(SessionState::Classifying),
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        self.state.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Moves the session to `state` unless it is already closed.
    pub(crate) fn set_state(&self, state: SessionState) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.state.store(state, Ordering::Release);
        true
    }

    /// Adds `delta` to the transfer counter and returns the new total.
    /// Closed sessions refuse the write and return `None`.
    pub(crate) fn record_transfer(&self, delta: u64) -> Option<u64> {
        if !self.is_alive() {
            return None;
        }
        Some(self.bytes_transferred.fetch_add(delta, Ordering::AcqRel) + delta)
    }

    /// Flips `alive` to false. Only the first call returns `true`.
    pub(crate) fn mark_closed(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            self.state.store(SessionState::Closed, Ordering::Release);
        }
        was_alive
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            peer: self.peer,
            connection_time: self.connection_time,
            display_row: self.display_row,
            request: self.request.clone(),
            bytes_transferred: self.bytes_transferred(),
            elapsed: self.elapsed(),
            state: self.state(),
        }
    }
}

/// Point-in-time copy of a [`Session`], detached from the registry.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct SessionSnapshot {
    #[getset(get_copy = "pub")]
    peer: SocketAddr,
    #[getset(get = "pub")]
    connection_time: DateTime<Local>,
    #[getset(get_copy = "pub")]
    display_row: u32,
    #[getset(get = "pub")]
    request: RequestSummary,
    #[getset(get_copy = "pub")]
    bytes_transferred: u64,
    #[getset(get_copy = "pub")]
    elapsed: Duration,
    #[getset(get_copy = "pub")]
    state: SessionState,
}
