//! # Server Configuration
//!
//! Listener addresses and leader election, taken from CLI flags.

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};

/// HTTP server and manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Metrics listener; `None` disables `/metrics`
    pub metrics_addr: Option<SocketAddr>,
    /// Probe listener; `None` disables `/healthz` and `/readyz`
    pub probe_addr: Option<SocketAddr>,
    /// Acquire the leader lease before reconciling
    pub leader_elect: bool,
    /// How long to wait for listeners to bind
    pub startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for listeners
    pub poll_interval_ms: u64,
}

impl ServerConfig {
    /// Build from the raw flag values
    ///
    /// # Errors
    /// Returns an error if a bind address cannot be parsed
    pub fn from_flags(metrics: &str, probe: &str, leader_elect: bool) -> Result<Self> {
        Ok(Self {
            metrics_addr: parse_bind_address(metrics)
                .with_context(|| format!("invalid --metrics-bind-address '{metrics}'"))?,
            probe_addr: parse_bind_address(probe)
                .with_context(|| format!("invalid --health-probe-bind-address '{probe}'"))?,
            leader_elect,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        })
    }
}

/// Parse a bind address in the forms `:8080`, `host:port`, `[::1]:8080` or `0` (disabled)
///
/// # Errors
/// Returns an error if the value is none of those forms
pub fn parse_bind_address(raw: &str) -> Result<Option<SocketAddr>> {
    let raw = raw.trim();
    if raw == "0" {
        return Ok(None);
    }

    if let Some(port) = raw.strip_prefix(':') {
        let port: u16 = port.parse().with_context(|| format!("invalid port '{port}'"))?;
        return Ok(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)));
    }

    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(Some(addr));
    }

    let (host, port) = raw
        .rsplit_once(':')
        .with_context(|| format!("expected host:port, got '{raw}'"))?;
    let port: u16 = port.parse().with_context(|| format!("invalid port '{port}'"))?;
    let ip = match host {
        "" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse()
            .with_context(|| format!("host '{other}' is not an IP address"))?,
    };
    Ok(Some(SocketAddr::new(ip, port)))
}
