//! Admission control for chunk migrations on a sharded database node.
//!
//! A shard node moves chunks (contiguous key ranges of a collection) to and
//! from other shards. This crate decides, per node, which migration may run:
//!
//! - At most one migration at a time, either donating or receiving
//! - Duplicate donor requests join the active migration and share its outcome
//! - A quiescence gate that stops new migrations and drains the active one
//! - Interruptible waits driven by an [`OperationContext`]
//!
//! # Example
//!
//! ```rust
//! use shardgate::{ChunkRange, MigrationRegistry, MoveChunkRequest, NamespaceString};
//! use shardgate::{OperationContext, RegistryConfig};
//! use std::time::Duration;
//!
//! let registry = MigrationRegistry::with_config(RegistryConfig::new("shard1"));
//! let ctx = OperationContext::new().with_timeout(Duration::from_secs(30));
//!
//! let request = MoveChunkRequest::new(
//!     NamespaceString::parse("db.coll")?,
//!     ChunkRange::new(0, 10)?,
//!     "shard1",
//!     "shard2",
//! );
//!
//! // Owner: runs the migration and publishes the outcome.
//! let owner = registry.register_donate_chunk(&ctx, &request)?;
//! assert!(owner.is_owner());
//!
//! // The same request again joins instead of conflicting.
//! let joiner = registry.register_donate_chunk(&ctx, &request)?;
//! assert!(!joiner.is_owner());
//!
//! owner.signal_complete(Ok(()));
//! joiner.wait_for_completion(&ctx)?;
//! drop(joiner);
//! drop(owner);
//!
//! // Stop new migrations, e.g. while dropping the collection.
//! let blocked = registry.block_migrations(&ctx, "drop collection")?;
//! assert!(registry.is_blocked());
//! drop(blocked);
//! # Ok::<(), shardgate::Error>(())
//! ```
//!
//! # Concurrency Model
//!
//! The API is synchronous and thread based. Blocking calls park the calling
//! thread on a condition variable and poll the operation context for
//! cancellation at [`RegistryConfig::interrupt_check_interval`].

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod migration;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use config::RegistryConfig;
pub use context::OperationContext;
pub use error::{ActiveMigration, Error, ErrorCode, Result};
pub use types::{ChunkRange, KeyValue, NamespaceString, ShardId};

// Re-export metrics types
pub use metrics::{AdmissionMetrics, AdmissionMetricsSnapshot, Counter, Gauge};

// Re-export migration types
pub use migration::{
    CompletionSignal, DonorAdmission, InMemoryMigrationSources, MigrationOutcome,
    MigrationRegistry, MigrationSource, MigrationSourceLookup, MigrationStatusReport,
    MigrationsBlocked, MoveChunkRequest, RecipientAdmission, SecondaryThrottle,
};
