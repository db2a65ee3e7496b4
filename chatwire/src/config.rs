//! Client configuration.
//!
//! All structs deserialize from JSON with every field optional, so hosts can
//! ship a partial settings file and rely on defaults for the rest.

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

/// Default chat envelope start marker.
pub const DEFAULT_ENVELOPE_START: &str = "CaSr";
/// Default chat envelope end marker.
pub const DEFAULT_ENVELOPE_END: &str = "CaEd";

/// Reconnect, keep-alive and give-up timing for a persistent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Interval between keep-alive pings while connected, in milliseconds.
    pub ping_delay_ms: u64,
    /// First reconnect delay in milliseconds.
    pub initial_backoff_delay_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds.
    pub max_backoff_delay_ms: u64,
    /// Continuous disconnection tolerated before giving up, in milliseconds.
    pub total_timeout_ms: u64,
    /// Fraction of the delay (0.0..1.0) randomly shaved off each wait.
    pub backoff_jitter: f64,
    /// Treat close codes 4000-4999 not preceded by an error as final.
    pub stop_on_server_close: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_delay_ms: 30_000,
            initial_backoff_delay_ms: 1_000,
            max_backoff_delay_ms: 30_000,
            total_timeout_ms: 60_000,
            backoff_jitter: 0.25,
            stop_on_server_close: true,
        }
    }
}

impl ConnectionConfig {
    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }

    pub fn initial_backoff_delay(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_delay_ms)
    }

    pub fn max_backoff_delay(&self) -> Duration {
        Duration::from_millis(self.max_backoff_delay_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff_delay_ms = initial.as_millis() as u64;
        self.max_backoff_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.backoff_jitter = jitter;
        self
    }

    pub fn with_stop_on_server_close(mut self, stop: bool) -> Self {
        self.stop_on_server_close = stop;
        self
    }

    /// Reject timing that would make the reconnect loop misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.ping_delay_ms == 0 {
            return Err(Error::invalid_config("ping_delay_ms must be positive"));
        }
        if self.initial_backoff_delay_ms == 0 {
            return Err(Error::invalid_config(
                "initial_backoff_delay_ms must be positive",
            ));
        }
        if self.max_backoff_delay_ms < self.initial_backoff_delay_ms {
            return Err(Error::invalid_config(
                "max_backoff_delay_ms is below initial_backoff_delay_ms",
            ));
        }
        if !(0.0..1.0).contains(&self.backoff_jitter) {
            return Err(Error::invalid_config("backoff_jitter must be in 0.0..1.0"));
        }
        Ok(())
    }
}

/// Chat service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Websocket URL of the chat service.
    pub url: String,
    pub envelope_start: String,
    pub envelope_end: String,
    /// Fail every pending request with `Error::Disconnected` on teardown
    /// instead of leaving it unanswered.
    pub fail_pending_on_disconnect: bool,
    pub connection: ConnectionConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            envelope_start: DEFAULT_ENVELOPE_START.to_string(),
            envelope_end: DEFAULT_ENVELOPE_END.to_string(),
            fail_pending_on_disconnect: false,
            connection: ConnectionConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        load_json(json)
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_envelope(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.envelope_start = start.into();
        self.envelope_end = end.into();
        self
    }

    pub fn with_fail_pending_on_disconnect(mut self, fail: bool) -> Self {
        self.fail_pending_on_disconnect = fail;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.envelope_start.is_empty() || self.envelope_end.is_empty() {
            return Err(Error::invalid_config("envelope markers must not be empty"));
        }
        self.connection.validate()
    }
}

/// Fleet watchdog (AMS) settings for a dedicated server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmsConfig {
    /// Watchdog websocket URL.
    pub url: String,
    /// Dedicated server id reported in the ready message.
    pub ds_id: String,
    /// Heartbeat interval after ready, in milliseconds.
    pub heartbeat_interval_ms: u64,
    pub connection: ConnectionConfig,
}

impl Default for AmsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ds_id: String::new(),
            heartbeat_interval_ms: 15_000,
            connection: ConnectionConfig::default(),
        }
    }
}

impl AmsConfig {
    pub fn new(url: impl Into<String>, ds_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ds_id: ds_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        load_json(json)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(Error::invalid_config("heartbeat_interval_ms must be positive"));
        }
        self.connection.validate()
    }
}

/// Default handshake header carrying the bound server name.
pub const DEFAULT_SERVER_NAME_HEADER: &str = "X-Ab-ServerName";

/// DS Hub settings for a dedicated server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsHubConfig {
    pub url: String,
    /// Handshake header the bound server name is sent in.
    pub server_name_header: String,
    pub connection: ConnectionConfig,
}

impl Default for DsHubConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            server_name_header: DEFAULT_SERVER_NAME_HEADER.to_string(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl DsHubConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        load_json(json)
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_name_header.is_empty() {
            return Err(Error::invalid_config("server_name_header must not be empty"));
        }
        self.connection.validate()
    }
}

fn load_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}
