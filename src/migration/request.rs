//! Arguments of a donor (move chunk) request.

use crate::types::{ChunkRange, NamespaceString, ShardId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum chunk size (128 MiB).
pub const DEFAULT_MAX_CHUNK_SIZE_BYTES: u64 = 128 * 1024 * 1024;

/// Write concern applied between cloning batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryThrottle {
    /// Do not wait for secondaries.
    #[default]
    Off,
    /// Wait for a majority of the recipient's replicas after each batch.
    Majority,
    /// Wait for the given number of replicas after each batch.
    Nodes(u32),
}

/// A request to donate one chunk to another shard.
///
/// The registry never inspects the protocol parameters. Two requests are
/// the same migration exactly when every field is equal, which is how a
/// retried request joins the original instead of starting a second one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveChunkRequest {
    /// Collection the chunk belongs to.
    pub nss: NamespaceString,
    /// Key range of the chunk.
    pub range: ChunkRange,
    /// Donor shard.
    pub from_shard: ShardId,
    /// Recipient shard.
    pub to_shard: ShardId,
    /// Epoch of the collection's routing table the request was built from.
    pub collection_epoch: Option<Uuid>,
    /// Chunks above this size are jumbo.
    pub max_chunk_size_bytes: u64,
    /// Replication throttle during cloning.
    pub secondary_throttle: SecondaryThrottle,
    /// Wait for the range deleter before returning.
    pub wait_for_delete: bool,
    /// Move the chunk even if it is jumbo.
    pub force_jumbo: bool,
}

impl MoveChunkRequest {
    /// Create a request with default protocol parameters.
    pub fn new(
        nss: NamespaceString,
        range: ChunkRange,
        from_shard: impl Into<ShardId>,
        to_shard: impl Into<ShardId>,
    ) -> Self {
        Self {
            nss,
            range,
            from_shard: from_shard.into(),
            to_shard: to_shard.into(),
            collection_epoch: None,
            max_chunk_size_bytes: DEFAULT_MAX_CHUNK_SIZE_BYTES,
            secondary_throttle: SecondaryThrottle::Off,
            wait_for_delete: false,
            force_jumbo: false,
        }
    }

    /// Set the collection epoch.
    pub fn with_collection_epoch(mut self, epoch: Uuid) -> Self {
        self.collection_epoch = Some(epoch);
        self
    }

    /// Set the maximum chunk size.
    pub fn with_max_chunk_size_bytes(mut self, bytes: u64) -> Self {
        self.max_chunk_size_bytes = bytes;
        self
    }

    /// Set the secondary throttle.
    pub fn with_secondary_throttle(mut self, throttle: SecondaryThrottle) -> Self {
        self.secondary_throttle = throttle;
        self
    }

    /// Wait for orphan cleanup before completing.
    pub fn with_wait_for_delete(mut self, wait: bool) -> Self {
        self.wait_for_delete = wait;
        self
    }

    /// Allow moving jumbo chunks.
    pub fn with_force_jumbo(mut self, force: bool) -> Self {
        self.force_jumbo = force;
        self
    }
}
