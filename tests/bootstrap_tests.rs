use jobboard_schema::{
    BootstrapConfig, Bootstrapper, Catalog, DriftDetector, DriftPolicy, Error, MigrationState,
    Mode, SchemaRegistry, SqliteCatalog, StorageFallback, StorageLocation, TableAction,
};
use rusqlite::Connection;
use std::fs;
use tempfile::TempDir;

fn config(tmp: &TempDir) -> BootstrapConfig {
    BootstrapConfig::new(tmp.path().join("data")).with_fallback_dir(tmp.path().join("fallback"))
}

fn production(tmp: &TempDir) -> BootstrapConfig {
    config(tmp).with_mode(Mode::Production)
}

fn assert_fully_declared(conn: &Connection) {
    let catalog = SqliteCatalog::new(conn);
    let detector = DriftDetector::new(&catalog);
    for table in SchemaRegistry::job_board().tables() {
        let report = detector.detect(table);
        assert!(!report.is_drifted(), "{} drifted: {:?}", table.name, report.reasons);
        assert!(!report.needs_reindex(), "{} missing {:?}", table.name, report.missing_indexes);
    }
}

#[test]
fn test_first_bootstrap_creates_everything() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(config(&tmp)).unwrap();
    let mut state = MigrationState::new(Mode::Development);

    let (database, report) = bootstrapper.bootstrap(&mut state).unwrap();

    assert!(report.ran());
    assert!(report.fallbacks.is_empty());
    assert_eq!(report.creates(), 8);
    assert_eq!(
        database.location(),
        &StorageLocation::Primary(tmp.path().join("data").join("jobboard.db"))
    );
    assert!(database.is_durable());
    assert!(state.is_initialized());
    database.with_conn(|conn| {
        assert_fully_declared(conn);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_second_bootstrap_in_same_process_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(config(&tmp)).unwrap();
    let mut state = MigrationState::new(Mode::Development);

    let (first, _) = bootstrapper.bootstrap(&mut state).unwrap();
    let (second, report) = bootstrapper.bootstrap(&mut state).unwrap();

    assert!(!report.ran());
    assert_eq!(report.drops(), 0);
    assert_eq!(report.creates(), 0);
    assert_eq!(state.passes(), 1);
    assert_eq!(first.location(), second.location());
}

#[test]
fn test_fresh_production_start_drops_nothing() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(production(&tmp)).unwrap();

    let (_, report) = bootstrapper
        .bootstrap(&mut MigrationState::for_config(bootstrapper.config()))
        .unwrap();

    assert_eq!(report.drops(), 0);
    assert_eq!(report.creates(), 8);
    let pass = report.pass.unwrap();
    assert_eq!(pass.outcome("users").unwrap().action, TableAction::Created);
}

#[test]
fn test_healthy_store_issues_no_ddl() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(production(&tmp)).unwrap();

    let (database, _) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Production)).unwrap();
    drop(database);

    let (_, report) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Production)).unwrap();
    let pass = report.pass.unwrap();
    assert!(pass.log.is_empty());
    assert!(pass.tables.iter().all(|t| t.action == TableAction::Unchanged));
}

#[test]
fn test_forced_rerun_only_in_development() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(config(&tmp)).unwrap();

    let mut dev = MigrationState::new(Mode::Development);
    bootstrapper.bootstrap(&mut dev).unwrap();
    dev.force_rerun();
    let (_, report) = bootstrapper.bootstrap(&mut dev).unwrap();
    assert!(report.ran());
    assert_eq!(dev.passes(), 2);

    let bootstrapper = Bootstrapper::new(production(&tmp)).unwrap();
    let mut prod = MigrationState::for_config(bootstrapper.config());
    bootstrapper.bootstrap(&mut prod).unwrap();
    prod.force_rerun();
    let (_, report) = bootstrapper.bootstrap(&mut prod).unwrap();
    assert!(!report.ran());
    assert_eq!(prod.passes(), 1);
}

#[test]
fn test_state_mode_must_match_configuration() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(production(&tmp)).unwrap();
    let mut state = MigrationState::new(Mode::Development);
    state.force_rerun();

    let result = bootstrapper.bootstrap(&mut state);
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(!state.is_initialized());
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn test_missing_column_rebuilds_dependents() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(config(&tmp)).unwrap();
    let (database, _) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Development)).unwrap();

    database
        .with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO users (id, email, password_hash, role) VALUES (1, 'e@x.io', 'h', 'employer');
                 INSERT INTO jobs (id, employer_id, title, description) VALUES (1, 1, 'Engineer', 'Build');
                 INSERT INTO applications (job_id, user_id) VALUES (1, 1);
                 ALTER TABLE jobs DROP COLUMN location;",
            )?;
            Ok(())
        })
        .unwrap();
    drop(database);

    let (database, report) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Development)).unwrap();
    let pass = report.pass.as_ref().unwrap();

    assert_eq!(pass.log.dropped_tables(), vec!["saved_jobs", "applications", "jobs"]);
    assert_eq!(pass.outcome("jobs").unwrap().action, TableAction::Rebuilt);
    assert_eq!(pass.outcome("applications").unwrap().action, TableAction::RebuiltAsDependent);
    assert_eq!(pass.outcome("saved_jobs").unwrap().action, TableAction::RebuiltAsDependent);
    assert_eq!(pass.outcome("users").unwrap().action, TableAction::Unchanged);

    database
        .with_conn(|conn| {
            assert_fully_declared(conn);
            let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            let jobs: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
            assert_eq!(users, 1);
            assert_eq!(jobs, 0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_refuse_policy_stops_startup_without_changes() {
    let tmp = TempDir::new().unwrap();
    let (database, _) = Bootstrapper::new(production(&tmp))
        .unwrap()
        .bootstrap(&mut MigrationState::new(Mode::Production))
        .unwrap();
    database
        .with_conn(|conn| Ok(conn.execute_batch("ALTER TABLE jobs DROP COLUMN location")?))
        .unwrap();
    drop(database);

    let refusing = Bootstrapper::new(production(&tmp).with_drift_policy(DriftPolicy::Refuse)).unwrap();
    let mut state = MigrationState::new(Mode::Production);
    let result = refusing.bootstrap(&mut state);

    assert!(matches!(result, Err(Error::DriftRefused { ref table, .. }) if table == "jobs"));
    assert!(!state.is_initialized());

    let conn = Connection::open(tmp.path().join("data").join("jobboard.db")).unwrap();
    let catalog = SqliteCatalog::new(&conn);
    assert!(!DriftDetector::new(&catalog).column_exists("jobs", "location").unwrap());
}

#[test]
fn test_unusable_primary_directory_falls_back() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "a regular file").unwrap();
    let config = BootstrapConfig::new(blocker.join("data")).with_fallback_dir(tmp.path().join("fallback"));

    let (database, report) = Bootstrapper::new(config)
        .unwrap()
        .bootstrap(&mut MigrationState::new(Mode::Development))
        .unwrap();

    assert_eq!(report.fallbacks.len(), 1);
    assert!(matches!(report.fallbacks[0], StorageFallback::SecondaryDirectory { .. }));
    assert_eq!(
        database.location(),
        &StorageLocation::Secondary(tmp.path().join("fallback").join("jobboard.db"))
    );
    assert!(tmp.path().join("fallback").join("jobboard.db").exists());
}

#[test]
fn test_unopenable_file_falls_back_to_memory() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("jobboard.db"), "this is not a sqlite database ".repeat(20)).unwrap();

    let (database, report) = Bootstrapper::new(config(&tmp))
        .unwrap()
        .bootstrap(&mut MigrationState::new(Mode::Development))
        .unwrap();

    assert_eq!(database.location(), &StorageLocation::InMemory);
    assert!(!database.is_durable());
    assert!(matches!(
        report.fallbacks.last(),
        Some(StorageFallback::InMemory { attempted: Some(_), .. })
    ));
    assert_eq!(report.creates(), 8);
    database
        .with_conn(|conn| {
            assert_fully_declared(conn);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_foreign_keys_enforced_on_handed_out_handle() {
    let tmp = TempDir::new().unwrap();
    let (database, _) = Bootstrapper::new(config(&tmp))
        .unwrap()
        .bootstrap(&mut MigrationState::new(Mode::Development))
        .unwrap();

    let result = database.with_conn(|conn| {
        conn.execute_batch("INSERT INTO jobs (employer_id, title, description) VALUES (42, 't', 'd')")?;
        Ok(())
    });
    assert!(matches!(result, Err(Error::Sqlite(_))));
}

#[test]
fn test_missing_index_restored_on_next_start() {
    let tmp = TempDir::new().unwrap();
    let bootstrapper = Bootstrapper::new(config(&tmp)).unwrap();
    let (database, _) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Development)).unwrap();
    database
        .with_conn(|conn| Ok(conn.execute_batch("DROP INDEX idx_saved_jobs_user_id")?))
        .unwrap();
    drop(database);

    let (database, report) = bootstrapper.bootstrap(&mut MigrationState::new(Mode::Development)).unwrap();
    assert_eq!(report.drops(), 0);
    assert_eq!(
        report.pass.as_ref().unwrap().outcome("saved_jobs").unwrap().action,
        TableAction::Reindexed
    );
    database
        .with_conn(|conn| {
            let indexes = SqliteCatalog::new(conn).index_names("saved_jobs")?;
            assert!(indexes.contains(&"idx_saved_jobs_user_id".to_string()));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_yaml_config_drives_bootstrap() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("schema.yaml");
    fs::write(
        &path,
        format!(
            "primary_dir: {}\ndatabase_file: board.db\nmode: production\njournal_mode: delete\n",
            tmp.path().join("store").display()
        ),
    )
    .unwrap();

    let config = BootstrapConfig::load(&path).unwrap();
    let (database, report) = Bootstrapper::new(config)
        .unwrap()
        .bootstrap(&mut MigrationState::new(Mode::Production))
        .unwrap();

    assert_eq!(report.mode, Mode::Production);
    assert_eq!(
        database.location(),
        &StorageLocation::Primary(tmp.path().join("store").join("board.db"))
    );
}
