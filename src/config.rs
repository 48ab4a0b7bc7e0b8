use crate::ContentType;
use getset::{CopyGetters, Getters};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8800;

/// Pacing never goes below this, so a zero tick can't spin the scheduler.
const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Getters)]
pub struct Config {
    #[getset(get = "pub")]
    bind_addr: SocketAddr,
    #[getset(get = "pub")]
    tarpit_config: TarpitConfig,
    #[getset(get = "pub")]
    dashboard_config: DashboardConfig,
}

impl Config {
    pub fn new<Addr>(
        addr: Addr,
        tarpit_config: TarpitConfig,
        dashboard_config: DashboardConfig,
    ) -> Self
    where
        Addr: Into<SocketAddr>,
    {
        Self {
            bind_addr: addr.into(),
            tarpit_config,
            dashboard_config,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            TarpitConfig::default(),
            DashboardConfig::default(),
        )
    }
}

#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct TarpitConfig {
    /// Delay between two chunks of the same session
    #[getset(get_copy = "pub")]
    tick: Duration,
    /// Number of filler lines in every chunk
    #[getset(get_copy = "pub")]
    filler_lines: usize,
    #[getset(get = "pub")]
    content_type: ContentType,
}

impl TarpitConfig {
    pub fn new(tick: Duration, filler_lines: usize, content_type: ContentType) -> Self {
        Self {
            tick: tick.max(MIN_TICK),
            filler_lines,
            content_type,
        }
    }
}

impl Default for TarpitConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), 100, ContentType::default())
    }
}

#[derive(Debug, Clone, Copy, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DashboardConfig {
    enabled: bool,
    /// Delay between two redraws
    refresh: Duration,
    /// Characters of user agent shown per session
    user_agent_width: usize,
}

impl DashboardConfig {
    pub fn new(enabled: bool, refresh: Duration, user_agent_width: usize) -> Self {
        Self {
            enabled,
            refresh: refresh.max(MIN_TICK),
            user_agent_width,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::new(true, Duration::from_millis(250), 50)
    }
}
