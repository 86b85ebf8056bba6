//! Migration tracker integration tests
//!
//! Exercise apply/rollback/status against a real SQLite file, including the
//! shipped `migrations/` directory.

use hello_world::{
    db::{self, MigrationTracker, Migrator},
    models::{ApplyOutcome, MigrationStatus, RollbackOutcome},
    utils::MigrationError,
};

use crate::common::{initial_unit, migrations_dir, shipped_migrations_dir, TestDatabase, INITIAL_VERSION};

#[tokio::test]
async fn test_apply_twice_runs_ddl_once() {
    let db = TestDatabase::new().await;
    let tracker = db.tracker();
    let unit = initial_unit();

    let first = tracker.apply(&unit.version, &unit.up_sql).await.unwrap();
    let second = tracker.apply(&unit.version, &unit.up_sql).await.unwrap();

    assert_eq!(first, ApplyOutcome::Applied);
    assert_eq!(second, ApplyOutcome::AlreadyApplied);
    // A second run of the INSERT would have failed on the primary key
    assert_eq!(db.messages().await, vec![(1, "Hello, World!".to_string())]);
    assert_eq!(tracker.status().await.unwrap().records().len(), 1);
}

#[tokio::test]
async fn test_second_apply_executes_nothing() {
    let db = TestDatabase::new().await;
    let tracker = db.tracker();
    tracker
        .apply(INITIAL_VERSION, "CREATE TABLE first_run (a INTEGER);")
        .await
        .unwrap();

    let outcome = tracker
        .apply(INITIAL_VERSION, "CREATE TABLE second_run (a INTEGER);")
        .await
        .unwrap();

    assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
    assert!(db.has_table("first_run").await);
    assert!(!db.has_table("second_run").await);
}

#[tokio::test]
async fn test_rollback_when_not_applied_is_noop() {
    let db = TestDatabase::new().await;
    let tracker = db.tracker();
    let unit = initial_unit();

    let outcome = tracker.rollback(&unit.version, &unit.down_sql).await.unwrap();

    assert_eq!(outcome, RollbackOutcome::NotApplied);
    assert_eq!(tracker.status().await.unwrap(), MigrationStatus::NoTrackingTable);

    tracker.ensure_tracking_table().await.unwrap();
    let outcome = tracker.rollback(&unit.version, &unit.down_sql).await.unwrap();
    assert_eq!(outcome, RollbackOutcome::NotApplied);
}

#[tokio::test]
async fn test_apply_rollback_apply_matches_single_apply() {
    let single = TestDatabase::new().await;
    let unit = initial_unit();
    single.tracker().apply(&unit.version, &unit.up_sql).await.unwrap();

    let cycled = TestDatabase::new().await;
    let tracker = cycled.tracker();
    tracker.apply(&unit.version, &unit.up_sql).await.unwrap();
    tracker.rollback(&unit.version, &unit.down_sql).await.unwrap();
    assert!(!cycled.has_table("messages").await);
    tracker.apply(&unit.version, &unit.up_sql).await.unwrap();

    assert_eq!(cycled.tables().await, single.tables().await);
    assert_eq!(cycled.messages().await, single.messages().await);

    let versions = |status: MigrationStatus| -> Vec<String> {
        status.records().iter().map(|r| r.version.clone()).collect()
    };
    assert_eq!(
        versions(tracker.status().await.unwrap()),
        versions(single.tracker().status().await.unwrap())
    );
}

#[tokio::test]
async fn test_partial_ddl_failure_leaves_nothing_behind() {
    let db = TestDatabase::new().await;
    let tracker = db.tracker();

    let err = tracker
        .apply(
            INITIAL_VERSION,
            "CREATE TABLE messages (id INTEGER PRIMARY KEY, content TEXT NOT NULL);
             INSERT INTO no_such_table (id) VALUES (1);",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Execute { .. }));
    assert_eq!(err.version(), Some(INITIAL_VERSION));
    assert!(!tracker.is_applied(INITIAL_VERSION).await.unwrap());
    assert!(!db.has_table("messages").await);
    assert_eq!(tracker.status().await.unwrap(), MigrationStatus::Tracked(vec![]));
}

#[tokio::test]
async fn test_status_distinguishes_missing_and_empty_table() {
    let db = TestDatabase::new().await;
    let tracker = db.tracker();

    assert_eq!(tracker.status().await.unwrap(), MigrationStatus::NoTrackingTable);

    tracker.ensure_tracking_table().await.unwrap();

    assert_eq!(tracker.status().await.unwrap(), MigrationStatus::Tracked(vec![]));
}

#[tokio::test]
async fn test_end_to_end_up_status_down_status() {
    let db = TestDatabase::new().await;
    let units = db::load_dir(&shipped_migrations_dir()).unwrap();
    let migrator = Migrator::new(db.tracker(), units);

    migrator.up().await.unwrap();

    let status = migrator.status().await.unwrap();
    assert_eq!(status.records().len(), 1);
    assert_eq!(status.records()[0].version, "001_initial_schema");

    let rolled_back = migrator.down().await.unwrap();
    assert_eq!(
        rolled_back,
        Some((INITIAL_VERSION.to_string(), RollbackOutcome::RolledBack))
    );

    assert_eq!(migrator.status().await.unwrap(), MigrationStatus::Tracked(vec![]));
    assert!(!db.has_table("messages").await);
}

#[tokio::test]
async fn test_directory_units_apply_in_version_order() {
    let db = TestDatabase::new().await;
    let dir = migrations_dir(&[
        (
            "002_add_author",
            "ALTER TABLE notes ADD COLUMN author TEXT;",
            "ALTER TABLE notes DROP COLUMN author;",
        ),
        (
            "001_notes",
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);",
            "DROP TABLE notes;",
        ),
    ]);
    let migrator = Migrator::new(db.tracker(), db::load_dir(dir.path()).unwrap());

    let outcomes = migrator.up().await.unwrap();
    let versions: Vec<_> = outcomes.iter().map(|(v, _)| v.as_str()).collect();
    assert_eq!(versions, ["001_notes", "002_add_author"]);

    let status = migrator.status().await.unwrap();
    let recorded: Vec<_> = status.records().iter().map(|r| r.version.as_str()).collect();
    assert_eq!(recorded, ["001_notes", "002_add_author"]);

    let outcomes = migrator.down_all().await.unwrap();
    assert!(outcomes.iter().all(|(_, o)| *o == RollbackOutcome::RolledBack));
    assert!(!db.has_table("notes").await);
}

#[tokio::test]
async fn test_trackers_on_separate_tables_are_independent() {
    let db = TestDatabase::new().await;
    let unit = initial_unit();
    let primary = db.tracker();
    let shadow = MigrationTracker::with_table(db.pool.clone(), "shadow_migrations");

    primary.apply(&unit.version, &unit.up_sql).await.unwrap();

    assert!(primary.is_applied(&unit.version).await.unwrap());
    assert!(!shadow.is_applied(&unit.version).await.unwrap());
    assert_eq!(shadow.status().await.unwrap(), MigrationStatus::NoTrackingTable);
}

#[tokio::test]
async fn test_down_refuses_recorded_version_without_files() {
    let db = TestDatabase::new().await;
    let dir = migrations_dir(&[
        ("001_authors", "CREATE TABLE authors (id INTEGER PRIMARY KEY);", "DROP TABLE authors;"),
        (
            "002_books",
            "CREATE TABLE books (id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES authors(id));",
            "DROP TABLE books;",
        ),
    ]);
    let all_units = db::load_dir(dir.path()).unwrap();
    Migrator::new(db.tracker(), all_units.clone()).up().await.unwrap();

    // 002 is recorded but its files are gone
    let first_only: Vec<_> = all_units.into_iter().take(1).collect();
    let migrator = Migrator::new(db.tracker(), first_only);

    let err = migrator.down().await.unwrap_err();
    assert!(matches!(err, MigrationError::InvalidSource(ref msg) if msg.contains("002_books")));

    let err = migrator.down_all().await.unwrap_err();
    assert!(matches!(err, MigrationError::InvalidSource(_)));

    let status = db.tracker().status().await.unwrap();
    let recorded: Vec<_> = status.records().iter().map(|r| r.version.as_str()).collect();
    assert_eq!(recorded, ["001_authors", "002_books"]);
    assert!(db.has_table("authors").await);
    assert!(db.has_table("books").await);
}

#[tokio::test]
async fn test_down_targets_highest_recorded_version() {
    let db = TestDatabase::new().await;
    let units = db::load_dir(
        migrations_dir(&[
            ("001_a", "CREATE TABLE a (id INTEGER);", "DROP TABLE a;"),
            ("002_b", "CREATE TABLE b (id INTEGER);", "DROP TABLE b;"),
            ("003_c", "CREATE TABLE c (id INTEGER);", "DROP TABLE c;"),
        ])
        .path(),
    )
    .unwrap();
    let tracker = db.tracker();
    // 002 lands after 003
    for version in ["001_a", "003_c", "002_b"] {
        let unit = units.iter().find(|u| u.version == version).unwrap();
        tracker.apply(&unit.version, &unit.up_sql).await.unwrap();
    }
    let migrator = Migrator::new(tracker, units);

    let rolled_back = migrator.down().await.unwrap();

    assert_eq!(rolled_back, Some(("003_c".to_string(), RollbackOutcome::RolledBack)));
    assert!(!db.has_table("c").await);
    assert!(db.has_table("b").await);

    let outcomes = migrator.down_all().await.unwrap();
    let versions: Vec<_> = outcomes.iter().map(|(v, _)| v.as_str()).collect();
    assert_eq!(versions, ["002_b", "001_a"]);
}
