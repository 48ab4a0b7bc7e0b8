//! Bookkeeping for every connection currently held by the tarpit.
//!
//! The registry is the only state shared between the per-connection engines
//! and the dashboard. Counters inside a [`Session`] are atomics so the
//! dashboard can read them without ever waiting on a writer.

use std::net::SocketAddr;
use thiserror::Error;

mod record;
mod registry;

pub use self::record::{RequestSummary, Session, SessionSnapshot, SessionState};
pub use self::registry::SessionRegistry;

/// First screen row handed out; row 0 belongs to the dashboard title.
pub const FIRST_DISPLAY_ROW: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("a session is already registered for {0}")]
    DuplicateSession(SocketAddr),

    #[error("no session registered for {0}")]
    UnknownSession(SocketAddr),
}
