use super::{Error, RequestSummary, Session, SessionSnapshot, FIRST_DISPLAY_ROW};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug)]
struct RegistryState {
    sessions: DashMap<SocketAddr, Arc<Session>>,
    /// Never decremented: rows of finished sessions are not handed out again.
    next_row: AtomicU32,
    total_sessions: AtomicU64,
    /// Bytes fed to sessions that have already been removed.
    retired_bytes: AtomicU64,
}

/// Live sessions keyed by the client's address and port.
///
/// Cloning is cheap and every clone observes the same sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryState {
                sessions: DashMap::new(),
                next_row: AtomicU32::new(FIRST_DISPLAY_ROW),
                total_sessions: AtomicU64::new(0),
                retired_bytes: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a new session for `peer` and assigns it the next display row.
    ///
    /// A peer that already has a live session is refused; the existing
    /// session keeps its accounting.
    pub fn create(&self, peer: SocketAddr, request: RequestSummary) -> Result<Arc<Session>, Error> {
        match self.inner.sessions.entry(peer) {
            Entry::Occupied(_) => {
                debug!("Refusing duplicate session for {}", peer);
                Err(Error::DuplicateSession(peer))
            }
            Entry::Vacant(entry) => {
                let row = self.inner.next_row.fetch_add(1, Ordering::Relaxed);
                let session = Arc::new(Session::new(peer, row, request));
                entry.insert(session.clone());
                self.inner.total_sessions.fetch_add(1, Ordering::Relaxed);
                trace!("Registered session {} on row {}", peer, row);
                Ok(session)
            }
        }
    }

    pub fn get(&self, peer: &SocketAddr) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .get(peer)
            .map(|entry| entry.value().clone())
    }

    /// Adds `delta` bytes to the session's counter and returns the new total.
    pub fn update_bytes(&self, peer: &SocketAddr, delta: u64) -> Result<u64, Error> {
        let session = self.get(peer).ok_or(Error::UnknownSession(*peer))?;
        session
            .record_transfer(delta)
            .ok_or(Error::UnknownSession(*peer))
    }

    pub fn remove(&self, peer: &SocketAddr) -> Option<Arc<Session>> {
        let (_, session) = self.inner.sessions.remove(peer)?;
        self.inner
            .retired_bytes
            .fetch_add(session.bytes_transferred(), Ordering::Relaxed);
        trace!("Removed session {}", peer);
        Some(session)
    }

    /// Copies of all live sessions ordered by display row.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<_> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        sessions.sort_by_key(|session| session.display_row());
        sessions
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Sessions created since startup.
    pub fn total_sessions(&self) -> u64 {
        self.inner.total_sessions.load(Ordering::Relaxed)
    }

    /// Bytes fed since startup, live sessions included.
    pub fn total_bytes(&self) -> u64 {
        let live: u64 = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().bytes_transferred())
            .sum();
        self.inner.retired_bytes.load(Ordering::Relaxed) + live
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
