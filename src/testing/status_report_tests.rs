use super::utils::{nss, registry, request, LONG_WAIT};
use super::StaticMigrationSource;
use crate::context::OperationContext;
use crate::migration::{InMemoryMigrationSources, MigrationStatusReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use test_log::test;

#[test]
fn test_report_follows_installed_source() {
    let registry = registry();
    let sources = Arc::new(InMemoryMigrationSources::new());
    registry.set_migration_source_lookup(sources.clone());

    let ctx = OperationContext::new();
    let a = request(0, 10, "shard2");
    let owner = registry.register_donate_chunk(&ctx, &a).unwrap();

    let source = Arc::new(StaticMigrationSource::for_request(&a));
    sources.install(&nss(), source.clone());
    source.record_session_entries(4);

    let report = registry.active_migration_status_report(&ctx).unwrap().unwrap();
    assert!(report.is_donor_shard);
    assert_eq!(report.chunk.to_string(), "[0, 10)");
    assert_eq!(report.session_entries_migrated, 4);

    // Reports travel as bytes to the diagnostics endpoint.
    let decoded = MigrationStatusReport::from_bytes(&report.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, report);

    sources.remove(&nss());
    assert_eq!(registry.active_migration_status_report(&ctx).unwrap(), None);

    owner.signal_complete(Ok(()));
}

#[test]
fn test_report_with_killed_context() {
    let registry = registry();
    let sources = Arc::new(InMemoryMigrationSources::new());
    registry.set_migration_source_lookup(sources.clone());

    let a = request(0, 10, "shard2");
    let owner = registry
        .register_donate_chunk(&OperationContext::new(), &a)
        .unwrap();
    sources.install(&nss(), Arc::new(StaticMigrationSource::for_request(&a)));

    let ctx = OperationContext::new();
    ctx.kill();
    assert!(registry
        .active_migration_status_report(&ctx)
        .unwrap_err()
        .is_interruption());

    owner.signal_complete(Ok(()));
}

#[test]
fn test_reports_race_with_migrations() {
    let registry = registry();
    let sources = Arc::new(InMemoryMigrationSources::new());
    registry.set_migration_source_lookup(sources.clone());
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let reader = s.spawn(|| {
            let ctx = OperationContext::new().with_timeout(LONG_WAIT);
            let mut seen = 0;
            while !done.load(Ordering::Acquire) {
                // Best effort: either nothing, or a report for our namespace.
                if let Some(report) = registry.active_migration_status_report(&ctx).unwrap() {
                    assert_eq!(report.collection, nss());
                    seen += 1;
                }
            }
            seen
        });

        let ctx = OperationContext::new();
        for i in 0..50 {
            let req = request(i * 10, i * 10 + 10, "shard2");
            let owner = registry.register_donate_chunk(&ctx, &req).unwrap();
            sources.install(&nss(), Arc::new(StaticMigrationSource::for_request(&req)));
            thread::yield_now();
            sources.remove(&nss());
            owner.signal_complete(Ok(()));
        }
        done.store(true, Ordering::Release);

        // No lower bound on `seen`; the reader only has to stay consistent.
        let _seen: usize = reader.join().unwrap();
    });

    assert!(registry.active_migration().is_none());
}
