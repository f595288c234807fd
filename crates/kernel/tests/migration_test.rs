#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Migration manager tests against in-memory migration hooks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use beacon_kernel::daemon::{Daemon, MigrationWatchJob};

use beacon_kernel::hook::HookRegistry;
use beacon_kernel::migration::{
    DEFAULT_MODULE, MigrationError, MigrationHook, MigrationManager, MigrationState,
};

use common::{FakeMigrationHook, journal, register};

fn registry() -> Arc<HookRegistry<dyn MigrationHook>> {
    Arc::new(HookRegistry::new())
}

#[tokio::test]
async fn discovers_pending_migrations_sorted_by_module() {
    let hooks = registry();
    let log = journal();
    register(&hooks, FakeMigrationHook::new("zeta", &["1"], &log));
    register(&hooks, FakeMigrationHook::new("alpha", &["1", "2"], &log));
    register(&hooks, FakeMigrationHook::new("empty", &[], &log));

    let manager = MigrationManager::load(hooks).await;

    assert_eq!(manager.count(), 2);
    assert!(manager.has_pending_migrations());
    assert!(manager.has_migrations("alpha"));
    assert!(!manager.has_migrations("empty"));

    let modules: Vec<&str> = manager.pending().map(|m| m.module_name()).collect();
    assert_eq!(modules, vec!["alpha", "zeta"]);

    let alpha = manager.migration("alpha").unwrap();
    assert_eq!(alpha.steps().len(), 2);
    assert_eq!(alpha.version(), "0");
    assert_eq!(alpha.state(), &MigrationState::Pending);
    assert!(alpha.is_module());
}

#[tokio::test]
async fn module_migrations_wait_for_the_application() {
    let hooks = registry();
    let log = journal();
    register(&hooks, FakeMigrationHook::new(DEFAULT_MODULE, &["5.0"], &log));
    register(&hooks, FakeMigrationHook::new("graphs", &["1"], &log));

    let mut manager = MigrationManager::load(hooks).await;
    assert_eq!(manager.framework_migrations().len(), 1);
    assert_eq!(manager.module_migrations().len(), 1);

    assert!(!manager.apply("graphs").await);
    assert!(log.lock().is_empty());
    assert!(manager.has_migrations("graphs"));

    assert!(manager.apply(DEFAULT_MODULE).await);
    assert!(manager.apply("graphs").await);
    assert_eq!(*log.lock(), vec!["beacon@5.0", "graphs@1"]);
    assert!(!manager.has_pending_migrations());
}

#[tokio::test]
async fn apply_all_runs_application_first_and_continues_past_failures() {
    let hooks = registry();
    let log = journal();
    register(&hooks, FakeMigrationHook::new("alpha", &["1"], &log));
    let broken = register(
        &hooks,
        FakeMigrationHook::new("broken", &["1", "2", "3"], &log).failing_at("2"),
    );
    register(&hooks, FakeMigrationHook::new("zeta", &["1"], &log));
    register(&hooks, FakeMigrationHook::new(DEFAULT_MODULE, &["1", "2"], &log));

    let mut manager = MigrationManager::load(hooks).await;
    assert!(!manager.apply_all().await);

    assert_eq!(
        *log.lock(),
        vec!["beacon@1", "beacon@2", "alpha@1", "broken@1", "zeta@1"]
    );

    // The failed migration stays pending with the failure recorded.
    assert_eq!(manager.count(), 1);
    let failed = manager.migration("broken").unwrap();
    match failed.state() {
        MigrationState::Failed { version, reason } => {
            assert_eq!(version, "2");
            assert!(reason.contains("syntax error"));
        }
        other => panic!("unexpected state: {other:?}"),
    }
    assert_eq!(failed.version(), "1");
    assert_eq!(failed.steps().len(), 2);
    assert_eq!(failed.steps()[0].last_error().map(|e| e.contains("syntax error")), Some(true));
    assert_eq!(broken.failures().len(), 1);
}

#[tokio::test]
async fn apply_all_stops_when_the_application_fails() {
    let hooks = registry();
    let log = journal();
    register(
        &hooks,
        FakeMigrationHook::new(DEFAULT_MODULE, &["1"], &log).failing_at("1"),
    );
    register(&hooks, FakeMigrationHook::new("graphs", &["1"], &log));

    let mut manager = MigrationManager::load(hooks).await;
    assert!(!manager.apply_all().await);
    assert!(log.lock().is_empty());
    assert_eq!(manager.count(), 2);
}

#[tokio::test]
async fn apply_by_name_requires_a_pending_migration() {
    let mut manager = MigrationManager::load(registry()).await;
    let err = manager.apply_by_name("nothing").await.unwrap_err();
    assert!(matches!(err, MigrationError::NotFound { .. }));
}

#[tokio::test]
async fn refresh_picks_up_remaining_steps() {
    let hooks = registry();
    let log = journal();
    register(
        &hooks,
        FakeMigrationHook::new("graphs", &["1", "2"], &log).failing_at("2"),
    );

    let mut manager = MigrationManager::load(Arc::clone(&hooks)).await;
    assert!(!manager.apply("graphs").await);

    manager.refresh().await;
    let graphs = manager.migration("graphs").unwrap();
    assert_eq!(graphs.version(), "1");
    assert_eq!(graphs.steps().len(), 1);
    assert_eq!(graphs.state(), &MigrationState::Pending);
}

#[tokio::test]
async fn retry_resumes_after_the_applied_steps() {
    let hooks = registry();
    let log = journal();
    register(
        &hooks,
        FakeMigrationHook::new("graphs", &["1", "2", "3"], &log).failing_once_at("2"),
    );

    let mut manager = MigrationManager::load(hooks).await;
    assert!(!manager.apply("graphs").await);

    let graphs = manager.migration("graphs").unwrap();
    assert_eq!(graphs.version(), "1");
    let left: Vec<&str> = graphs.steps().iter().map(|s| s.version()).collect();
    assert_eq!(left, vec!["2", "3"]);

    assert!(manager.apply("graphs").await);
    assert_eq!(*log.lock(), vec!["graphs@1", "graphs@2", "graphs@3"]);
    assert!(!manager.has_pending_migrations());
}

#[tokio::test]
async fn summary_groups_system_and_modules() {
    let hooks = registry();
    let log = journal();
    register(
        &hooks,
        FakeMigrationHook::new(DEFAULT_MODULE, &["1"], &log).with_privileges(&["CREATE", "ALTER"]),
    );
    register(
        &hooks,
        FakeMigrationHook::new("graphs", &["1", "2"], &log).with_privileges(&["ALTER", "INDEX"]),
    );

    let manager = MigrationManager::load(hooks).await;
    let summary = manager.summary();
    assert_eq!(summary.system.len(), 1);
    assert_eq!(summary.modules.len(), 1);
    assert_eq!(summary.modules[0].migrations.len(), 2);
    assert_eq!(summary.modules[0].migrations[0].description.as_deref(), Some("step 1"));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["System"][0]["module"], "beacon");
    assert_eq!(json["Modules"][0]["migrated_version"], "0");

    assert_eq!(
        manager.required_database_privileges(),
        vec!["CREATE", "ALTER", "INDEX"]
    );
}

#[tokio::test]
async fn watch_job_survives_a_zero_interval() {
    let hooks = registry();
    let log = journal();
    register(&hooks, FakeMigrationHook::new("graphs", &["1"], &log));

    let mut daemon = Daemon::new().with_grace_period(Duration::from_millis(100));
    daemon.add_job(MigrationWatchJob::new(
        MigrationManager::load(hooks).await,
        Duration::ZERO,
    ));
    daemon
        .run_until(tokio::time::sleep(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(log.lock().is_empty());
}
