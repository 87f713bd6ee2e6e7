//! Testing utilities for migration admission.
//!
//! This module provides helpers for exercising the registry from many
//! threads:
//! - Polling assertions for state that changes on another thread
//! - A controllable [`MigrationSource`] for status report tests
//!
//! # Example
//!
//! ```rust
//! use shardgate::testing::{StaticMigrationSource, TestAssertions};
//! use shardgate::{ChunkRange, MigrationSource, MoveChunkRequest, NamespaceString};
//! use std::time::Duration;
//!
//! let request = MoveChunkRequest::new(
//!     NamespaceString::parse("db.coll")?,
//!     ChunkRange::new(0, 10)?,
//!     "shard1",
//!     "shard2",
//! );
//! let source = StaticMigrationSource::for_request(&request);
//! source.record_session_entries(3);
//!
//! TestAssertions::assert_eventually(
//!     || source.status_report().session_entries_migrated == 3,
//!     Duration::from_secs(1),
//!     "session entries recorded",
//! );
//! # Ok::<(), shardgate::Error>(())
//! ```

#[cfg(test)]
mod status_report_tests;
#[cfg(test)]
mod utils;

use crate::migration::{MigrationSource, MigrationStatusReport, MoveChunkRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Polling assertions for state updated by other threads.
pub struct TestAssertions;

impl TestAssertions {
    /// Assert that a condition becomes true within timeout.
    pub fn assert_eventually<F>(check: F, timeout: Duration, message: &str)
    where
        F: Fn() -> bool,
    {
        if !Self::wait_for(check, timeout) {
            panic!("Assertion failed after {:?}: {}", timeout, message);
        }
    }

    /// Wait for a condition to become true. Returns whether it did.
    pub fn wait_for<F>(condition: F, timeout: Duration) -> bool
    where
        F: Fn() -> bool,
    {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }
}

/// A [`MigrationSource`] that reports a fixed migration and a settable
/// session entry count.
#[derive(Debug)]
pub struct StaticMigrationSource {
    report: MigrationStatusReport,
    session_entries: AtomicU64,
}

impl StaticMigrationSource {
    /// Create a source reporting on `request` from the donor's side.
    pub fn for_request(request: &MoveChunkRequest) -> Self {
        Self {
            report: MigrationStatusReport::for_donor(request),
            session_entries: AtomicU64::new(0),
        }
    }

    /// Add transferred session entries.
    pub fn record_session_entries(&self, count: u64) {
        self.session_entries.fetch_add(count, Ordering::Relaxed);
    }
}

impl MigrationSource for StaticMigrationSource {
    fn status_report(&self) -> MigrationStatusReport {
        MigrationStatusReport {
            session_entries_migrated: self.session_entries.load(Ordering::Relaxed),
            ..self.report.clone()
        }
    }
}
