//! Configuration for the migration registry.

use crate::context::clamp_check_interval;
use crate::types::ShardId;
use std::time::Duration;

/// Configuration for a [`MigrationRegistry`](crate::MigrationRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Name of the shard this node belongs to. Only used to tag log events.
    pub shard_id: Option<ShardId>,

    /// Upper bound on how long a blocked wait sleeps before re-checking
    /// whether its operation was killed. Waits bound it to 1ms..=1s
    /// whichever way it was set.
    pub interrupt_check_interval: Duration,

    /// A registration or gate wait longer than this logs a warning.
    pub slow_wait_threshold: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            shard_id: None,
            interrupt_check_interval: Duration::from_millis(10),
            slow_wait_threshold: Duration::from_secs(5),
        }
    }
}

impl RegistryConfig {
    /// Create a configuration for the given shard.
    pub fn new(shard_id: impl Into<ShardId>) -> Self {
        Self {
            shard_id: Some(shard_id.into()),
            ..Default::default()
        }
    }

    /// Set the interrupt check interval.
    ///
    /// Clamped to 1ms..=1s so waits neither spin nor miss a kill for long.
    pub fn with_interrupt_check_interval(mut self, interval: Duration) -> Self {
        self.interrupt_check_interval = clamp_check_interval(interval);
        self
    }

    /// Set the slow wait warning threshold.
    pub fn with_slow_wait_threshold(mut self, threshold: Duration) -> Self {
        self.slow_wait_threshold = threshold;
        self
    }

    /// Shard name for log fields, `"-"` when unset.
    pub(crate) fn shard_label(&self) -> &str {
        self.shard_id.as_ref().map(ShardId::as_str).unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert!(config.shard_id.is_none());
        assert_eq!(config.interrupt_check_interval, Duration::from_millis(10));
        assert_eq!(config.shard_label(), "-");
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::new("shard1")
            .with_interrupt_check_interval(Duration::ZERO)
            .with_slow_wait_threshold(Duration::from_millis(250));

        assert_eq!(config.shard_label(), "shard1");
        assert_eq!(config.interrupt_check_interval, Duration::from_millis(1));
        assert_eq!(config.slow_wait_threshold, Duration::from_millis(250));

        let config = RegistryConfig::default().with_interrupt_check_interval(Duration::MAX);
        assert_eq!(config.interrupt_check_interval, Duration::from_secs(1));
    }
}
