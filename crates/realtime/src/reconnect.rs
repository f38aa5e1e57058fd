//! Exponential-backoff reconnection to the collaboration relay.
//!
//! When the socket drops, the connection task calls [`reconnect_loop`],
//! which keeps retrying with growing delays until a connection succeeds or
//! the [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{RealtimeClient, RealtimeConnection};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Wait before reconnect attempt number `attempt` (1-based).
    pub fn wait_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Wait, then try to reconnect, growing the wait after every failure.
///
/// Returns `Some(connection)` once connected, or `None` if `cancel` fires
/// first.
pub async fn reconnect_loop(
    client: &RealtimeClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<RealtimeConnection> {
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        let delay = config.wait_before(attempt);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(url = client.ws_url(), "Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        tracing::info!(
            url = client.ws_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to relay",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(url = client.ws_url(), attempt, "Reconnected to relay");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_waits_grow_until_thirty_seconds() {
        let config = ReconnectConfig::default();
        let waits: Vec<u64> = (1..=8).map(|n| config.wait_before(n).as_secs()).collect();
        assert_eq!(waits, [1, 2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn long_outage_stays_at_ceiling() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(config.wait_before(4), Duration::from_secs(8));
        assert_eq!(config.wait_before(5), Duration::from_secs(10));
        assert_eq!(config.wait_before(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancelled_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = RealtimeClient::new("ws://127.0.0.1:9/ws");
        let result = reconnect_loop(&client, &ReconnectConfig::default(), &cancel).await;
        assert!(result.is_none());
    }
}
