//! In-process admission metrics.
//!
//! Counters and gauges are plain atomics updated on the admission paths.
//! Exporting them is left to the embedding node.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can increase or decrease.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicI64::new(0),
        }
    }

    /// Get the gauge name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set the gauge to a specific value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Increment the gauge by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Metrics kept by a [`MigrationRegistry`](crate::MigrationRegistry).
#[derive(Debug)]
pub struct AdmissionMetrics {
    /// Donor migrations newly admitted (owner admissions).
    pub donor_admissions: Counter,
    /// Duplicate donor requests that joined an active migration.
    pub donor_joins: Counter,
    /// Recipient migrations admitted.
    pub recipient_admissions: Counter,
    /// Registrations refused with a conflict.
    pub conflicts: Counter,
    /// Blocking waits that ended because the operation was killed or timed out.
    pub interrupted_waits: Counter,
    /// Times the quiescence gate was taken.
    pub gate_locks: Counter,
    /// Donor migrations currently registered (0 or 1).
    pub active_donors: Gauge,
    /// Recipient migrations currently registered (0 or 1).
    pub active_recipients: Gauge,
    /// 1 while the quiescence gate is held.
    pub migrations_blocked: Gauge,
}

impl AdmissionMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self {
            donor_admissions: Counter::new("donor_admissions"),
            donor_joins: Counter::new("donor_joins"),
            recipient_admissions: Counter::new("recipient_admissions"),
            conflicts: Counter::new("admission_conflicts"),
            interrupted_waits: Counter::new("admission_interrupted_waits"),
            gate_locks: Counter::new("migration_gate_locks"),
            active_donors: Gauge::new("active_donors"),
            active_recipients: Gauge::new("active_recipients"),
            migrations_blocked: Gauge::new("migrations_blocked"),
        }
    }

    /// Get a snapshot of all values.
    pub fn snapshot(&self) -> AdmissionMetricsSnapshot {
        AdmissionMetricsSnapshot {
            donor_admissions: self.donor_admissions.get(),
            donor_joins: self.donor_joins.get(),
            recipient_admissions: self.recipient_admissions.get(),
            conflicts: self.conflicts.get(),
            interrupted_waits: self.interrupted_waits.get(),
            gate_locks: self.gate_locks.get(),
            active_donors: self.active_donors.get(),
            active_recipients: self.active_recipients.get(),
            migrations_blocked: self.migrations_blocked.get() != 0,
        }
    }
}

impl Default for AdmissionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`AdmissionMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionMetricsSnapshot {
    pub donor_admissions: u64,
    pub donor_joins: u64,
    pub recipient_admissions: u64,
    pub conflicts: u64,
    pub interrupted_waits: u64,
    pub gate_locks: u64,
    pub active_donors: i64,
    pub active_recipients: i64,
    pub migrations_blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_counter_and_gauge() {
        let counter = Counter::new("c");
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.name(), "c");

        let gauge = Gauge::new("g");
        gauge.inc();
        gauge.dec();
        gauge.dec();
        assert_eq!(gauge.get(), -1);
        gauge.set(1);
        assert_eq!(gauge.get(), 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = AdmissionMetrics::new();
        metrics.donor_admissions.inc();
        metrics.active_donors.inc();
        metrics.migrations_blocked.set(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.donor_admissions, 1);
        assert_eq!(snapshot.active_donors, 1);
        assert!(snapshot.migrations_blocked);
        assert_eq!(snapshot.conflicts, 0);
    }
}
