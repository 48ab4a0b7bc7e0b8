use super::{Filler, MethodClass, TrapMethod};
use crate::events::EventLogger;
use crate::metadata::ClientMetadata;
use crate::session::{self, Session, SessionRegistry, SessionState};
use bytes::Bytes;
use hyper::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

/// The per-connection engine.
///
/// A feed owns one [`Session`] from the moment a request is classified until
/// the transport lets go of it. The transport signals connection loss by
/// dropping the feed, which is when the session is closed, reported and
/// removed from the registry.
#[derive(Debug)]
pub struct DripFeed {
    session: Arc<Session>,
    registry: SessionRegistry,
    events: EventLogger,
    filler: Filler,
    pacing: Interval,
    chunks_sent: u64,
    ticks: u64,
}

impl DripFeed {
    /// Registers a session for the client. Must be called within a tokio
    /// runtime.
    pub fn open(
        metadata: &ClientMetadata,
        registry: &SessionRegistry,
        events: &EventLogger,
        filler: Filler,
        tick: Duration,
    ) -> Result<Self, session::Error> {
        let session = registry.create(metadata.peer(), metadata.summary())?;
        events.connect(&session);
        let mut pacing = time::interval(tick);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            session,
            registry: registry.clone(),
            events: events.clone(),
            filler,
            pacing,
            chunks_sent: 0,
            ticks: 0,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    /// Pacing ticks spent holding a probe.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Decides how the request is handled and records the decision on the
    /// session.
    pub fn classify(&self, method: &Method) -> MethodClass {
        let class = TrapMethod::classify(method);
        let state = match class {
            MethodClass::Trap => SessionState::Trapping,
            MethodClass::Probe => SessionState::Probing,
            MethodClass::Reject => SessionState::Rejecting,
        };
        self.session.set_state(state);
        debug!("{} {} classified as {:?}", self.session.peer(), method, class);
        class
    }

    /// Waits for the next pacing tick and produces a chunk of filler.
    ///
    /// The first chunk is available immediately. Returns `None` once the
    /// session is closed.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.pacing.tick().await;
        if !self.session.is_alive() {
            return None;
        }
        let chunk = self.filler.chunk();
        self.registry
            .update_bytes(&self.session.peer(), chunk.len() as u64)
            .ok()?;
        self.chunks_sent += 1;
        trace!("Feeding chunk {} to {}", self.chunks_sent, self.session.peer());
        Some(chunk)
    }

    /// Occupies the client without sending anything, on the same cadence as
    /// the trap. Only returns once the session is closed.
    pub async fn hold(&mut self) {
        loop {
            self.pacing.tick().await;
            if !self.session.is_alive() {
                return;
            }
            self.ticks += 1;
        }
    }

    fn close(&mut self) {
        if !self.session.mark_closed() {
            return;
        }
        let duration = self.session.elapsed();
        self.events.disconnect(&self.session, duration);
        self.registry.remove(&self.session.peer());
        info!(
            "Client {} disconnected after {:?}, fed {} bytes",
            self.session.peer(),
            duration,
            self.session.bytes_transferred()
        );
    }
}

impl Drop for DripFeed {
    fn drop(&mut self) {
        self.close();
    }
}
