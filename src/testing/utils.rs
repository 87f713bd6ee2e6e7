use crate::config::RegistryConfig;
use crate::migration::{MigrationRegistry, MoveChunkRequest};
use crate::types::{ChunkRange, NamespaceString};
use std::time::Duration;

/// Generous timeout for waits that are expected to succeed.
pub(crate) const LONG_WAIT: Duration = Duration::from_secs(10);

/// How long to watch a thread that is expected to stay blocked.
pub(crate) const SETTLE: Duration = Duration::from_millis(50);

pub(crate) fn nss() -> NamespaceString {
    NamespaceString::parse("db.coll").unwrap()
}

pub(crate) fn request(min: i64, max: i64, to: &str) -> MoveChunkRequest {
    MoveChunkRequest::new(nss(), ChunkRange::new(min, max).unwrap(), "shard1", to)
}

pub(crate) fn registry() -> MigrationRegistry {
    MigrationRegistry::with_config(
        RegistryConfig::new("shard1")
            .with_interrupt_check_interval(Duration::from_millis(2))
            .with_slow_wait_threshold(Duration::from_millis(500)),
    )
}
