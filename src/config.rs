//! Runtime configuration read from the environment

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::error::{ChannelError, ConfigError};

/// Origin the dashboard is served from when nothing else is configured
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:3001";

/// Derive the realtime endpoint from the page origin.
///
/// `http` becomes `ws` and `https` becomes `wss`; host and port are kept and
/// the path is always `/ws`.
pub fn endpoint_from_origin(origin: &Url) -> Result<Url, ChannelError> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "unsupported scheme {other:?} in {origin}"
            )))
        }
    };

    let mut endpoint = origin.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|()| ChannelError::InvalidEndpoint(origin.to_string()))?;
    endpoint.set_path("/ws");
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}

/// Tuning for the channel client
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub endpoint: Url,
    /// Period between `ping` frames while connected
    pub keepalive_interval: Duration,
    /// Delay before reconnecting after the connection drops
    pub reconnect_delay: Duration,
    /// Delay before reconnecting after the connection could not be opened
    pub connect_failure_delay: Duration,
    /// How long the activity flag stays up after a message
    pub activity_window: Duration,
}

impl ChannelConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            keepalive_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            connect_failure_delay: Duration::from_secs(5),
            activity_window: Duration::from_secs(2),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = match lookup("WPANEL_REALTIME_URL") {
            Some(raw) => parse_url("WPANEL_REALTIME_URL", &raw)?,
            None => {
                let origin = lookup("WPANEL_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.into());
                endpoint_from_origin(&parse_url("WPANEL_ORIGIN", &origin)?)?
            }
        };

        let defaults = Self::new(endpoint);
        Ok(Self {
            keepalive_interval: millis(&lookup, "WPANEL_KEEPALIVE_MS", defaults.keepalive_interval)?,
            reconnect_delay: millis(&lookup, "WPANEL_RECONNECT_MS", defaults.reconnect_delay)?,
            connect_failure_delay: millis(
                &lookup,
                "WPANEL_CONNECT_FAILURE_MS",
                defaults.connect_failure_delay,
            )?,
            activity_window: millis(&lookup, "WPANEL_ACTIVITY_MS", defaults.activity_window)?,
            endpoint: defaults.endpoint,
        })
    }
}

/// Settings for the realtime hub
#[derive(Clone, Debug)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,
    /// Events buffered per subscriber before it is reported as lagged
    pub capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            capacity: 1024,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("WPANEL_HUB_BIND") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "WPANEL_HUB_BIND",
                expected: "a socket address",
                value: raw,
            })?,
            None => defaults.bind_addr,
        };

        let capacity = match lookup("WPANEL_HUB_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "WPANEL_HUB_CAPACITY",
                        expected: "a positive number",
                        value: raw,
                    })
                }
            },
            None => defaults.capacity,
        };

        Ok(Self {
            bind_addr,
            capacity,
        })
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::Url { name, source })
}

fn millis<F>(lookup: &F, name: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };

    let value = raw
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            name,
            expected: "a number of milliseconds",
            value: raw.clone(),
        })?;

    if value.is_zero() {
        return Err(ConfigError::ZeroDuration { name, value });
    }
    Ok(value)
}
