mod config;
pub mod dashboard;
pub mod events;
pub mod metadata;
mod server;
pub mod session;
mod tarpit;
mod util;

pub use self::config::{Config as DripTrapConfig, DashboardConfig, TarpitConfig, DEFAULT_PORT};
pub use self::server::{BoundServer, Error as ServerError, Server as DripTrapServer};
pub use self::tarpit::{DripFeed, Error, Filler, MethodClass, Tarpit, TrapBody, TrapMethod};
pub use self::util::ContentType;
