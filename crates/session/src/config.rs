use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use planboard_core::collaboration::{
    ACTIVITY_FEED_CAPACITY, HISTORY_POLL_INTERVAL_SECS, LOOPBACK_DELAY_MS,
};
use planboard_sheets::EDIT_HISTORY_SHEET;

/// Which transport carries collaboration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// In-process echo; every event comes back to the local subscribers only.
    #[default]
    Loopback,
    /// WebSocket to a relay shared by every collaborator.
    Socket,
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loopback" => Ok(Self::Loopback),
            "socket" | "websocket" => Ok(Self::Socket),
            other => Err(format!("expected `loopback` or `socket`, got `{other}`")),
        }
    }
}

/// A configuration variable that is present but unusable.
#[derive(Debug, thiserror::Error)]
#[error("{var} is invalid ({value:?}): {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Collaboration session configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel: ChannelKind,
    /// Relay endpoint, used when `channel` is [`ChannelKind::Socket`].
    pub ws_url: String,
    /// Spreadsheet proxy endpoint.
    pub proxy_url: String,
    /// Sheet holding the edit history.
    pub history_sheet: String,
    /// Directory of the local fallback store.
    pub local_store_dir: PathBuf,
    /// How often the ledger reloads from the durable store.
    pub poll_interval: Duration,
    /// Simulated delivery delay of the loopback channel.
    pub loopback_delay: Duration,
    /// Number of entries kept by the activity feed.
    pub feed_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: ChannelKind::Loopback,
            ws_url: "ws://127.0.0.1:3001/ws".into(),
            proxy_url: "http://127.0.0.1:3000/api/google-sheets".into(),
            history_sheet: EDIT_HISTORY_SHEET.into(),
            local_store_dir: PathBuf::from(".planboard"),
            poll_interval: Duration::from_secs(HISTORY_POLL_INTERVAL_SECS),
            loopback_delay: Duration::from_millis(LOOPBACK_DELAY_MS),
            feed_capacity: ACTIVITY_FEED_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                                     |
    /// |--------------------------------|---------------------------------------------|
    /// | `PLANBOARD_CHANNEL`            | `loopback` (or `socket`)                    |
    /// | `PLANBOARD_WS_URL`             | `ws://127.0.0.1:3001/ws`                    |
    /// | `PLANBOARD_PROXY_URL`          | `http://127.0.0.1:3000/api/google-sheets`   |
    /// | `PLANBOARD_HISTORY_SHEET`      | `EditHistory`                               |
    /// | `PLANBOARD_LOCAL_STORE_DIR`    | `.planboard`                                |
    /// | `PLANBOARD_POLL_INTERVAL_SECS` | `10`                                        |
    /// | `PLANBOARD_LOOPBACK_DELAY_MS`  | `100`                                       |
    /// | `PLANBOARD_FEED_CAPACITY`      | `10`                                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let channel = match lookup("PLANBOARD_CHANNEL") {
            Some(value) => value.parse().map_err(|reason| ConfigError {
                var: "PLANBOARD_CHANNEL",
                value,
                reason,
            })?,
            None => defaults.channel,
        };

        let poll_secs = parse_var(&lookup, "PLANBOARD_POLL_INTERVAL_SECS", HISTORY_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError {
                var: "PLANBOARD_POLL_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let feed_capacity = parse_var(&lookup, "PLANBOARD_FEED_CAPACITY", ACTIVITY_FEED_CAPACITY)?;
        if feed_capacity == 0 {
            return Err(ConfigError {
                var: "PLANBOARD_FEED_CAPACITY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let loopback_ms = parse_var(&lookup, "PLANBOARD_LOOPBACK_DELAY_MS", LOOPBACK_DELAY_MS)?;

        Ok(Self {
            channel,
            ws_url: lookup("PLANBOARD_WS_URL").unwrap_or(defaults.ws_url),
            proxy_url: lookup("PLANBOARD_PROXY_URL").unwrap_or(defaults.proxy_url),
            history_sheet: lookup("PLANBOARD_HISTORY_SHEET").unwrap_or(defaults.history_sheet),
            local_store_dir: lookup("PLANBOARD_LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_store_dir),
            poll_interval: Duration::from_secs(poll_secs),
            loopback_delay: Duration::from_millis(loopback_ms),
            feed_capacity,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.channel, ChannelKind::Loopback);
        assert_eq!(config.history_sheet, "EditHistory");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.loopback_delay, Duration::from_millis(100));
        assert_eq!(config.feed_capacity, 10);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("PLANBOARD_CHANNEL", "Socket"),
            ("PLANBOARD_WS_URL", "wss://relay.example/ws"),
            ("PLANBOARD_LOCAL_STORE_DIR", "/tmp/pb"),
            ("PLANBOARD_LOOPBACK_DELAY_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.channel, ChannelKind::Socket);
        assert_eq!(config.ws_url, "wss://relay.example/ws");
        assert_eq!(config.local_store_dir, PathBuf::from("/tmp/pb"));
        assert_eq!(config.loopback_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = SessionConfig::from_lookup(lookup(&[("PLANBOARD_CHANNEL", "carrier-pigeon")])).unwrap_err();
        assert_eq!(err.var, "PLANBOARD_CHANNEL");

        let err = SessionConfig::from_lookup(lookup(&[("PLANBOARD_FEED_CAPACITY", "many")])).unwrap_err();
        assert_eq!(err.var, "PLANBOARD_FEED_CAPACITY");

        let err = SessionConfig::from_lookup(lookup(&[("PLANBOARD_POLL_INTERVAL_SECS", "0")])).unwrap_err();
        assert_eq!(err.var, "PLANBOARD_POLL_INTERVAL_SECS");
    }
}
