//! Scoped admissions handed out by the [`MigrationRegistry`].
//!
//! Each admission releases what it holds when dropped:
//!
//! - [`DonorAdmission`]: an owner clears the donor slot; a joiner holds nothing.
//! - [`RecipientAdmission`]: clears the recipient slot.
//! - [`MigrationsBlocked`]: reopens the quiescence gate.

use crate::context::OperationContext;
use crate::error::Result;
use crate::migration::registry::MigrationRegistry;
use crate::migration::signal::CompletionSignal;
use std::sync::Arc;

/// Final result of a donor migration, shared with every joiner.
pub type MigrationOutcome = Result<()>;

/// Admission of a donor migration.
///
/// The *owner* is the first registration of a request; it must run the
/// migration and call [`signal_complete`](Self::signal_complete) before it
/// is dropped. A *joiner* is a later registration of an equal request; it
/// must not run anything and instead calls
/// [`wait_for_completion`](Self::wait_for_completion) to learn the owner's
/// outcome.
///
/// # Panics
///
/// Dropping an owner that has not signaled completion panics. Joiners would
/// otherwise wait forever. If the owner is already unwinding from another
/// panic this aborts the process.
#[must_use = "dropping a donor admission immediately releases it"]
#[derive(Debug)]
pub struct DonorAdmission<'a> {
    /// Set only for the owner; cleared once released.
    registry: Option<&'a MigrationRegistry>,
    is_owner: bool,
    signal: Arc<CompletionSignal<MigrationOutcome>>,
}

impl<'a> DonorAdmission<'a> {
    pub(super) fn owner(
        registry: &'a MigrationRegistry,
        signal: Arc<CompletionSignal<MigrationOutcome>>,
    ) -> Self {
        Self {
            registry: Some(registry),
            is_owner: true,
            signal,
        }
    }

    pub(super) fn joiner(signal: Arc<CompletionSignal<MigrationOutcome>>) -> Self {
        Self {
            registry: None,
            is_owner: false,
            signal,
        }
    }

    /// Whether this admission owns the migration and must execute it.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Publish the migration's outcome to every joiner.
    ///
    /// # Panics
    ///
    /// Panics on a joiner, or if the outcome was already signaled.
    pub fn signal_complete(&self, outcome: MigrationOutcome) {
        if !self.is_owner {
            tracing::error!("Joiner tried to signal donor migration completion");
            panic!("only the owner of a donor migration may signal completion");
        }
        tracing::debug!(ok = outcome.is_ok(), "Signaling donor migration completion");
        self.signal.set(outcome);
    }

    /// Run the migration, signal its outcome and return it.
    ///
    /// # Panics
    ///
    /// Same conditions as [`signal_complete`](Self::signal_complete).
    pub fn execute<F>(&self, migrate: F) -> MigrationOutcome
    where
        F: FnOnce() -> MigrationOutcome,
    {
        let outcome = migrate();
        self.signal_complete(outcome.clone());
        outcome
    }

    /// Wait for the owner's outcome.
    ///
    /// Returns the owner's error if the migration failed, or this
    /// operation's own `Interrupted`/`DeadlineExceeded` if `ctx` gives up
    /// first. The migration itself keeps running in the latter case.
    ///
    /// # Panics
    ///
    /// Panics on the owner.
    pub fn wait_for_completion(&self, ctx: &OperationContext) -> MigrationOutcome {
        if self.is_owner {
            tracing::error!("Owner tried to wait for its own donor migration");
            panic!("the owner of a donor migration cannot wait for its completion");
        }
        self.signal.get(ctx)?
    }
}

impl Drop for DonorAdmission<'_> {
    fn drop(&mut self) {
        let Some(registry) = self.registry.take() else {
            tracing::debug!("Releasing joined donate chunk admission");
            return;
        };

        tracing::debug!("Releasing owned donate chunk admission");
        if !self.signal.is_set() {
            tracing::error!("Donor migration released without signaling completion");
            panic!("donor migration released without signaling completion");
        }
        registry.clear_donate_chunk();
    }
}

/// Admission of a recipient migration. Clears the recipient slot on drop.
#[must_use = "dropping a recipient admission immediately releases it"]
#[derive(Debug)]
pub struct RecipientAdmission<'a> {
    registry: &'a MigrationRegistry,
}

impl<'a> RecipientAdmission<'a> {
    pub(super) fn new(registry: &'a MigrationRegistry) -> Self {
        Self { registry }
    }
}

impl Drop for RecipientAdmission<'_> {
    fn drop(&mut self) {
        tracing::debug!("Releasing receive chunk admission");
        self.registry.clear_receive_chunk();
    }
}

/// Holds the quiescence gate closed until dropped.
#[must_use = "dropping the guard immediately reopens the gate"]
#[derive(Debug)]
pub struct MigrationsBlocked<'a> {
    registry: &'a MigrationRegistry,
    reason: String,
}

impl<'a> MigrationsBlocked<'a> {
    pub(super) fn new(registry: &'a MigrationRegistry, reason: String) -> Self {
        Self { registry, reason }
    }

    /// Reason given when the gate was closed.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Drop for MigrationsBlocked<'_> {
    fn drop(&mut self) {
        self.registry.unlock(&self.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::migration::request::MoveChunkRequest;
    use crate::types::{ChunkRange, NamespaceString};
    use std::time::Duration;
    use test_log::test;

    fn request() -> MoveChunkRequest {
        MoveChunkRequest::new(
            NamespaceString::parse("db.coll").unwrap(),
            ChunkRange::new(0, 10).unwrap(),
            "shard1",
            "shard2",
        )
    }

    #[test]
    fn test_joiner_sees_owner_error() {
        let registry = MigrationRegistry::new();
        let ctx = OperationContext::new();

        let owner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        let joiner = registry.register_donate_chunk(&ctx, &request()).unwrap();

        let outcome = owner.execute(|| Err(Error::migration_failed("recipient aborted")));
        assert!(outcome.is_err());

        assert_eq!(
            joiner.wait_for_completion(&ctx),
            Err(Error::MigrationFailed("recipient aborted".to_string()))
        );
    }

    #[test]
    fn test_joiner_wait_times_out_while_owner_runs() {
        let registry = MigrationRegistry::new();
        let ctx = OperationContext::new();

        let owner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        let joiner = registry.register_donate_chunk(&ctx, &request()).unwrap();

        let wait_ctx = OperationContext::new().with_timeout(Duration::from_millis(20));
        let err = joiner.wait_for_completion(&wait_ctx).unwrap_err();
        assert!(err.is_interruption());

        // The joiner giving up does not affect the owner.
        drop(joiner);
        assert!(registry.active_migration().is_some());
        owner.signal_complete(Ok(()));
    }

    #[test]
    fn test_joiner_after_completion_before_release() {
        let registry = MigrationRegistry::new();
        let ctx = OperationContext::new();

        let owner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        owner.signal_complete(Ok(()));

        // Still registered until the owner is dropped, so this joins and
        // returns the stored outcome immediately.
        let joiner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        assert!(!joiner.is_owner());
        assert_eq!(joiner.wait_for_completion(&ctx), Ok(()));
    }

    #[test]
    #[should_panic(expected = "donor migration released without signaling completion")]
    fn test_owner_dropped_without_signal_panics() {
        let registry = MigrationRegistry::new();
        let owner = registry
            .register_donate_chunk(&OperationContext::new(), &request())
            .unwrap();
        drop(owner);
    }

    #[test]
    #[should_panic(expected = "only the owner of a donor migration may signal completion")]
    fn test_joiner_signal_panics() {
        let registry = MigrationRegistry::new();
        let ctx = OperationContext::new();
        let owner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        owner.signal_complete(Ok(()));
        let joiner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        joiner.signal_complete(Ok(()));
    }

    #[test]
    #[should_panic(expected = "the owner of a donor migration cannot wait for its completion")]
    fn test_owner_wait_panics() {
        let registry = MigrationRegistry::new();
        let ctx = OperationContext::new();
        let owner = registry.register_donate_chunk(&ctx, &request()).unwrap();
        owner.signal_complete(Ok(()));
        let _ = owner.wait_for_completion(&ctx);
    }

    #[test]
    fn test_blocked_guard_reason() {
        let registry = MigrationRegistry::new();
        let blocked = registry
            .block_migrations(&OperationContext::new(), "collection drop")
            .unwrap();
        assert_eq!(blocked.reason(), "collection drop");
        assert!(registry.is_blocked());
        drop(blocked);
        assert!(!registry.is_blocked());
    }
}
