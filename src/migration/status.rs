//! Diagnostic status reports for the active donor migration.
//!
//! The registry only knows *which* namespace is donating. The detailed
//! report comes from the live migration source object for that namespace,
//! which is looked up through a [`MigrationSourceLookup`] under the
//! namespace's own lock, never under the registry lock.

use crate::context::OperationContext;
use crate::error::Result;
use crate::migration::request::MoveChunkRequest;
use crate::types::{ChunkRange, NamespaceString, ShardId};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Status of an in-flight migration, as reported by its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusReport {
    /// Donor shard.
    pub source: ShardId,
    /// Recipient shard.
    pub destination: ShardId,
    /// Whether the reporting node is the donor.
    pub is_donor_shard: bool,
    /// Chunk being moved.
    pub chunk: ChunkRange,
    /// Collection the chunk belongs to.
    pub collection: NamespaceString,
    /// Session history entries transferred so far.
    pub session_entries_migrated: u64,
}

impl MigrationStatusReport {
    /// Build the donor-side report for a request.
    pub fn for_donor(request: &MoveChunkRequest) -> Self {
        Self {
            source: request.from_shard.clone(),
            destination: request.to_shard.clone(),
            is_donor_shard: true,
            chunk: request.range.clone(),
            collection: request.nss.clone(),
            session_entries_migrated: 0,
        }
    }

    /// Serialize the report.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a report.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// A live migration source (the donor-side protocol driver).
pub trait MigrationSource: Send + Sync {
    /// Produce a report of the migration's current progress.
    fn status_report(&self) -> MigrationStatusReport;
}

/// Per-namespace lookup of the live migration source.
pub trait MigrationSourceLookup: Send + Sync {
    /// Report on the migration source for `nss`, if one is installed.
    ///
    /// Implementations take the namespace's lock in shared mode and may
    /// block, so they must honor `ctx`.
    fn status_report(
        &self,
        ctx: &OperationContext,
        nss: &NamespaceString,
    ) -> Result<Option<MigrationStatusReport>>;
}

type SourceSlot = Arc<RwLock<Option<Arc<dyn MigrationSource>>>>;

/// In-memory [`MigrationSourceLookup`] keyed by namespace.
///
/// Each namespace has its own lock; installing or removing a source takes
/// it exclusively, report lookups take it shared.
#[derive(Default)]
pub struct InMemoryMigrationSources {
    sources: DashMap<NamespaceString, SourceSlot>,
}

impl std::fmt::Debug for InMemoryMigrationSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMigrationSources")
            .field("namespaces", &self.sources.len())
            .finish()
    }
}

impl InMemoryMigrationSources {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, nss: &NamespaceString) -> SourceSlot {
        self.sources
            .entry(nss.clone())
            .or_insert_with(|| Arc::new(RwLock::new(None)))
            .value()
            .clone()
    }

    /// Install the live source for `nss`, replacing any previous one.
    pub fn install(&self, nss: &NamespaceString, source: Arc<dyn MigrationSource>) {
        *self.slot(nss).write() = Some(source);
        tracing::debug!(ns = %nss, "Migration source installed");
    }

    /// Remove the live source for `nss`.
    pub fn remove(&self, nss: &NamespaceString) -> Option<Arc<dyn MigrationSource>> {
        let removed = self.sources.get(nss).and_then(|slot| slot.write().take());
        if removed.is_some() {
            tracing::debug!(ns = %nss, "Migration source removed");
        }
        removed
    }

    /// Check if a source is installed for `nss`.
    pub fn contains(&self, nss: &NamespaceString) -> bool {
        self.sources
            .get(nss)
            .map(|slot| slot.read().is_some())
            .unwrap_or(false)
    }
}

impl MigrationSourceLookup for InMemoryMigrationSources {
    fn status_report(
        &self,
        ctx: &OperationContext,
        nss: &NamespaceString,
    ) -> Result<Option<MigrationStatusReport>> {
        ctx.check_for_interrupt()?;

        // Clone the slot out so the map shard is not held while reporting.
        let Some(slot) = self.sources.get(nss).map(|s| s.value().clone()) else {
            return Ok(None);
        };

        let source = slot.read();
        Ok(source.as_ref().map(|s| s.status_report()))
    }
}
