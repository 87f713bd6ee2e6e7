//! Chunk migration admission for a single shard node.
//!
//! A node may take part in at most one chunk migration at a time, either as
//! the donor (sending a chunk) or as the recipient (receiving one). The
//! [`MigrationRegistry`] enforces this and hands out scoped admissions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MigrationRegistry                          │
//! │                                                                 │
//! │  Mutex<RegistryState> ──────────── Condvar (notify_all)         │
//! │   ├─ slot: Idle | Donating(DonorState) | Receiving(...)         │
//! │   └─ migrations_blocked                                         │
//! │                                                                 │
//! │  register_donate_chunk ──▶ DonorAdmission (owner | joiner)      │
//! │  register_receive_chunk ─▶ RecipientAdmission                   │
//! │  lock / block_migrations ▶ MigrationsBlocked                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │ owner and joiners share
//!                 ▼
//!        Arc<CompletionSignal<MigrationOutcome>>
//! ```
//!
//! # Donor Deduplication
//!
//! A donor request equal (field by field) to the active one joins it: the
//! caller gets a joiner admission that shares the owner's completion signal
//! and only waits for the outcome. Any other request while a migration is
//! active fails with `ConflictingOperationInProgress`.
//!
//! # Quiescence Gate
//!
//! `lock` sets the blocked flag, then waits for the slot to drain. Once the
//! flag is set, registrations wait instead of conflicting, and later `lock`
//! callers wait for `unlock`. The first blocker is favored over new
//! registrations.
//!
//! # Lock Hierarchy
//!
//! 1. Registry mutex
//! 2. Completion signal mutex (never taken while holding the registry mutex
//!    to wait)
//!
//! Namespace locks used for status reports are never taken while holding
//! the registry mutex.
//!
//! # Example
//!
//! ```rust
//! use shardgate::migration::{MigrationRegistry, MoveChunkRequest};
//! use shardgate::{ChunkRange, NamespaceString, OperationContext};
//!
//! let registry = MigrationRegistry::new();
//! let ctx = OperationContext::new();
//! let request = MoveChunkRequest::new(
//!     NamespaceString::parse("db.coll")?,
//!     ChunkRange::new(0, 10)?,
//!     "shard1",
//!     "shard2",
//! );
//!
//! let admission = registry.register_donate_chunk(&ctx, &request)?;
//! if admission.is_owner() {
//!     admission.execute(|| {
//!         // Clone, catch up and commit the chunk.
//!         Ok(())
//!     })?;
//! } else {
//!     admission.wait_for_completion(&ctx)?;
//! }
//! # Ok::<(), shardgate::Error>(())
//! ```

mod admission;
mod registry;
mod request;
mod signal;
mod status;

pub use admission::{DonorAdmission, MigrationOutcome, MigrationsBlocked, RecipientAdmission};
pub use registry::MigrationRegistry;
pub use request::{MoveChunkRequest, SecondaryThrottle, DEFAULT_MAX_CHUNK_SIZE_BYTES};
pub use signal::CompletionSignal;
pub use status::{
    InMemoryMigrationSources, MigrationSource, MigrationSourceLookup, MigrationStatusReport,
};
