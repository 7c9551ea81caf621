use crate::error::{LroError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Tunables for a `Poller`. Values are milliseconds, matching the wire-friendly
/// shape hosts load from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Delay between polls when the last response carries no usable retry-after hint.
    pub default_poll_interval_ms: u64,
    /// How long a caller that lost the activation race waits before asking again.
    pub activation_retry_delay_ms: u64,
}

impl PollerConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
    pub const DEFAULT_ACTIVATION_RETRY_DELAY_MS: u64 = 5;

    pub fn builder() -> PollerConfigBuilder {
        PollerConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_poll_interval_ms == 0 {
            return Err(LroError::InvalidConfig(
                "default poll interval must be positive".to_string(),
            ));
        }
        if self.activation_retry_delay_ms == 0 {
            return Err(LroError::InvalidConfig(
                "activation retry delay must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(self.default_poll_interval_ms)
    }

    pub fn activation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.activation_retry_delay_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            activation_retry_delay_ms: Self::DEFAULT_ACTIVATION_RETRY_DELAY_MS,
        }
    }
}

pub struct PollerConfigBuilder {
    config: PollerConfig,
}

impl PollerConfigBuilder {
    /// Sub-millisecond intervals round down, so `Duration::from_micros(10)` is rejected by `build()`.
    pub fn default_poll_interval(mut self, interval: Duration) -> Self {
        self.config.default_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn activation_retry_delay(mut self, delay: Duration) -> Self {
        self.config.activation_retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> Result<PollerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
