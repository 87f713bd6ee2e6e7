//! Node-local registry of the active chunk migration.

use crate::config::RegistryConfig;
use crate::context::OperationContext;
use crate::error::{ActiveMigration, Error, Result};
use crate::metrics::{AdmissionMetrics, AdmissionMetricsSnapshot};
use crate::migration::admission::{
    DonorAdmission, MigrationOutcome, MigrationsBlocked, RecipientAdmission,
};
use crate::migration::request::MoveChunkRequest;
use crate::migration::signal::CompletionSignal;
use crate::migration::status::{MigrationSourceLookup, MigrationStatusReport};
use crate::types::{ChunkRange, NamespaceString, ShardId};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::time::Instant;

/// The outbound migration currently admitted on this node.
///
/// Immutable once created; only its presence in the slot changes.
#[derive(Debug)]
struct DonorState {
    request: MoveChunkRequest,
    signal: Arc<CompletionSignal<MigrationOutcome>>,
}

impl DonorState {
    fn active_migration(&self) -> ActiveMigration {
        ActiveMigration::Donating {
            nss: self.request.nss.clone(),
            range: self.request.range.clone(),
            to_shard: self.request.to_shard.clone(),
        }
    }
}

/// The inbound migration currently admitted on this node.
#[derive(Debug)]
struct RecipientState {
    nss: NamespaceString,
    range: ChunkRange,
    from_shard: ShardId,
}

impl RecipientState {
    fn active_migration(&self) -> ActiveMigration {
        ActiveMigration::Receiving {
            nss: self.nss.clone(),
            range: self.range.clone(),
            from_shard: self.from_shard.clone(),
        }
    }
}

/// A node runs at most one migration, in one direction.
#[derive(Debug)]
enum MigrationSlot {
    Idle,
    Donating(DonorState),
    Receiving(RecipientState),
}

impl MigrationSlot {
    fn is_idle(&self) -> bool {
        matches!(self, MigrationSlot::Idle)
    }

    fn active_migration(&self) -> Option<ActiveMigration> {
        match self {
            MigrationSlot::Idle => None,
            MigrationSlot::Donating(donor) => Some(donor.active_migration()),
            MigrationSlot::Receiving(recipient) => Some(recipient.active_migration()),
        }
    }
}

#[derive(Debug)]
struct RegistryState {
    slot: MigrationSlot,
    /// Quiescence gate: while set, no new migration may be admitted.
    migrations_blocked: bool,
}

/// Gatekeeper that serializes migration admission on one node.
///
/// At most one donor *or* one recipient migration is admitted at a time.
/// A donor request equal to the active one joins it instead of conflicting.
/// [`lock`](Self::lock) closes the gate to new admissions and waits for the
/// active migration to drain.
///
/// All state lives under one mutex. Its condition variable is shared by
/// every waiter (gate waiters, drain waiters), so every state change wakes
/// all of them and each re-checks its own predicate.
///
/// The registry lives as long as the node's service runtime; admissions
/// borrow it and cannot outlive it.
pub struct MigrationRegistry {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
    lock_cond: Condvar,
    metrics: AdmissionMetrics,
    source_lookup: RwLock<Option<Arc<dyn MigrationSourceLookup>>>,
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("has_source_lookup", &self.source_lookup.read().is_some())
            .finish()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRegistry {
    /// Create a registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RegistryState {
                slot: MigrationSlot::Idle,
                migrations_blocked: false,
            }),
            lock_cond: Condvar::new(),
            metrics: AdmissionMetrics::new(),
            source_lookup: RwLock::new(None),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Install the per-namespace lookup used for status reports.
    pub fn set_migration_source_lookup(&self, lookup: Arc<dyn MigrationSourceLookup>) {
        *self.source_lookup.write() = Some(lookup);
    }

    /// Get a snapshot of the admission metrics.
    pub fn metrics(&self) -> AdmissionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Close the gate to new migrations and wait for the active one to drain.
    ///
    /// Concurrent callers are serialized: a second `lock` first waits for
    /// the current holder to [`unlock`](Self::unlock). Once the flag is set,
    /// registrations wait behind it even while an earlier migration is still
    /// draining.
    ///
    /// If interrupted while draining, the gate is reopened before the error
    /// is returned.
    #[tracing::instrument(skip_all, fields(op_id = ctx.op_id(), shard = %self.config.shard_label()))]
    pub fn lock(&self, ctx: &OperationContext, reason: &str) -> Result<()> {
        let mut state = self.state.lock();

        // Hold back additional lock requests while one is in progress.
        self.wait_for(ctx, &mut state, "gate release", |s| !s.migrations_blocked)?;

        tracing::info!(reason, "Going to start blocking migrations");
        state.migrations_blocked = true;
        self.metrics.gate_locks.inc();
        self.metrics.migrations_blocked.set(1);

        if let Err(e) = self.wait_for(ctx, &mut state, "migration drain", |s| s.slot.is_idle()) {
            state.migrations_blocked = false;
            self.metrics.migrations_blocked.set(0);
            self.lock_cond.notify_all();
            tracing::warn!(reason, error = %e, "Gave up blocking migrations while draining");
            return Err(e);
        }

        Ok(())
    }

    /// Reopen the gate and wake all waiters.
    pub fn unlock(&self, reason: &str) {
        let mut state = self.state.lock();

        tracing::info!(
            reason,
            shard = %self.config.shard_label(),
            "Going to stop blocking migrations"
        );
        state.migrations_blocked = false;
        self.metrics.migrations_blocked.set(0);

        self.lock_cond.notify_all();
    }

    /// Scoped form of [`lock`](Self::lock): the gate reopens when the
    /// returned guard is dropped.
    pub fn block_migrations(
        &self,
        ctx: &OperationContext,
        reason: impl Into<String>,
    ) -> Result<MigrationsBlocked<'_>> {
        let reason = reason.into();
        self.lock(ctx, &reason)?;
        Ok(MigrationsBlocked::new(self, reason))
    }

    /// Check if the gate is closed.
    pub fn is_blocked(&self) -> bool {
        self.state.lock().migrations_blocked
    }

    /// Register this node as the donor for `request`.
    ///
    /// Returns an owner admission when the migration is new, or a joiner
    /// admission when an equal request is already active. Fails with
    /// `ConflictingOperationInProgress` when any other migration is active.
    /// Waits (interruptibly) while the gate is closed.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(op_id = ctx.op_id(), ns = %request.nss, range = %request.range)
    )]
    pub fn register_donate_chunk(
        &self,
        ctx: &OperationContext,
        request: &MoveChunkRequest,
    ) -> Result<DonorAdmission<'_>> {
        let mut state = self.state.lock();

        if state.migrations_blocked {
            tracing::info!("Register donate chunk waiting for migrations to be unblocked");
            self.wait_for(ctx, &mut state, "gate release", |s| !s.migrations_blocked)?;
        }

        match &state.slot {
            MigrationSlot::Receiving(recipient) => {
                self.metrics.conflicts.inc();
                tracing::info!(
                    current_keys = %recipient.range,
                    current_from_shard = %recipient.from_shard,
                    new_to_shard = %request.to_shard,
                    "Donate chunk refused, shard is receiving"
                );
                return Err(Error::ConflictingOperationInProgress(
                    recipient.active_migration(),
                ));
            }
            MigrationSlot::Donating(donor) if donor.request == *request => {
                self.metrics.donor_joins.inc();
                tracing::info!(
                    keys = %request.range,
                    to_shard = %request.to_shard,
                    "Joining already active donate chunk"
                );
                return Ok(DonorAdmission::joiner(donor.signal.clone()));
            }
            MigrationSlot::Donating(donor) => {
                self.metrics.conflicts.inc();
                tracing::info!(
                    current_keys = %donor.request.range,
                    current_to_shard = %donor.request.to_shard,
                    new_keys = %request.range,
                    new_to_shard = %request.to_shard,
                    "Donate chunk refused, shard is donating"
                );
                return Err(Error::ConflictingOperationInProgress(
                    donor.active_migration(),
                ));
            }
            MigrationSlot::Idle => {}
        }

        let signal = Arc::new(CompletionSignal::with_check_interval(
            self.config.interrupt_check_interval,
        ));
        state.slot = MigrationSlot::Donating(DonorState {
            request: request.clone(),
            signal: signal.clone(),
        });
        self.metrics.donor_admissions.inc();
        self.metrics.active_donors.inc();

        tracing::info!(
            keys = %request.range,
            to_shard = %request.to_shard,
            "Donate chunk registered"
        );

        Ok(DonorAdmission::owner(self, signal))
    }

    /// Register this node as the recipient of `range` of `nss` from
    /// `from_shard`.
    ///
    /// Recipient admissions are never joined: any active migration,
    /// including an identical receive, is a conflict. Waits (interruptibly)
    /// while the gate is closed.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(op_id = ctx.op_id(), ns = %nss, range = %range, from_shard = %from_shard)
    )]
    pub fn register_receive_chunk(
        &self,
        ctx: &OperationContext,
        nss: &NamespaceString,
        range: &ChunkRange,
        from_shard: &ShardId,
    ) -> Result<RecipientAdmission<'_>> {
        let mut state = self.state.lock();

        if state.migrations_blocked {
            tracing::info!("Register receive chunk waiting for migrations to be unblocked");
            self.wait_for(ctx, &mut state, "gate release", |s| !s.migrations_blocked)?;
        }

        if let Some(active) = state.slot.active_migration() {
            self.metrics.conflicts.inc();
            tracing::info!(
                current_ns = %active.nss(),
                current_keys = %active.range(),
                current_peer = %active.peer_shard(),
                donating = active.is_donating(),
                "Receive chunk refused"
            );
            return Err(Error::ConflictingOperationInProgress(active));
        }

        state.slot = MigrationSlot::Receiving(RecipientState {
            nss: nss.clone(),
            range: range.clone(),
            from_shard: from_shard.clone(),
        });
        self.metrics.recipient_admissions.inc();
        self.metrics.active_recipients.inc();

        tracing::debug!("Receive chunk registered");

        Ok(RecipientAdmission::new(self))
    }

    /// Namespace of the active donor migration, if any.
    ///
    /// Snapshot only: the donor may finish right after this returns.
    pub fn active_donate_chunk_namespace(&self) -> Option<NamespaceString> {
        match &self.state.lock().slot {
            MigrationSlot::Donating(donor) => Some(donor.request.nss.clone()),
            _ => None,
        }
    }

    /// Description of the active migration, if any.
    pub fn active_migration(&self) -> Option<ActiveMigration> {
        self.state.lock().slot.active_migration()
    }

    /// Detailed report on the active donor migration.
    ///
    /// Best effort. The donor namespace is read under the registry lock,
    /// which is released before the namespace's migration source is
    /// consulted, so the report can describe a migration that has since
    /// finished or return `None` for one that just started. Holding both
    /// locks would order the registry lock before namespace locks, which
    /// the registration path cannot honor.
    pub fn active_migration_status_report(
        &self,
        ctx: &OperationContext,
    ) -> Result<Option<MigrationStatusReport>> {
        let Some(nss) = self.active_donate_chunk_namespace() else {
            return Ok(None);
        };

        let lookup = self.source_lookup.read().clone();
        match lookup {
            Some(lookup) => lookup.status_report(ctx, &nss),
            None => Ok(None),
        }
    }

    pub(super) fn clear_donate_chunk(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.slot, MigrationSlot::Idle) {
            MigrationSlot::Donating(donor) => {
                tracing::info!(
                    current_keys = %donor.request.range,
                    current_to_shard = %donor.request.to_shard,
                    "Donate chunk cleared"
                );
                self.metrics.active_donors.dec();
                self.lock_cond.notify_all();
            }
            other => {
                state.slot = other;
                tracing::error!(slot = ?state.slot, "No donor migration to clear");
                panic!("clearing a donor migration that is not registered");
            }
        }
    }

    pub(super) fn clear_receive_chunk(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.slot, MigrationSlot::Idle) {
            MigrationSlot::Receiving(recipient) => {
                tracing::debug!(
                    current_keys = %recipient.range,
                    current_from_shard = %recipient.from_shard,
                    "Receive chunk cleared"
                );
                self.metrics.active_recipients.dec();
                self.lock_cond.notify_all();
            }
            other => {
                state.slot = other;
                tracing::error!(slot = ?state.slot, "No recipient migration to clear");
                panic!("clearing a recipient migration that is not registered");
            }
        }
    }

    /// Wait on the registry condition until `predicate` holds.
    ///
    /// Warns once if the wait outlasts the configured threshold and counts
    /// interrupted waits.
    fn wait_for<F>(
        &self,
        ctx: &OperationContext,
        state: &mut MutexGuard<'_, RegistryState>,
        waiting_for: &'static str,
        mut predicate: F,
    ) -> Result<()>
    where
        F: FnMut(&RegistryState) -> bool,
    {
        let started = Instant::now();
        let mut warned = false;

        let result = ctx.wait_for_condition_or_interrupt(
            &self.lock_cond,
            state,
            self.config.interrupt_check_interval,
            |s| {
                if predicate(&*s) {
                    return true;
                }
                if !warned && started.elapsed() >= self.config.slow_wait_threshold {
                    warned = true;
                    tracing::warn!(
                        waiting_for,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Migration admission wait is taking long"
                    );
                }
                false
            },
        );

        if let Err(e) = &result {
            self.metrics.interrupted_waits.inc();
            tracing::info!(waiting_for, error = %e, "Migration admission wait interrupted");
        }
        result
    }
}

impl Drop for MigrationRegistry {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let state = self.state.get_mut();
        assert!(
            !matches!(state.slot, MigrationSlot::Donating(_)),
            "migration registry dropped with an active donor migration"
        );
    }
}
