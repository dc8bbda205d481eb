use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use crate::config::{BootstrapConfig, Mode};
use crate::dependency::DependencyGraph;
use crate::drift::{Catalog, DriftDetector, DriftReport, DriftStatus, SqliteCatalog};
use crate::error::{Error, Result};
use crate::migration::{DriftPolicy, ExecutionLog, MigrationExecutor, MigrationPlan};
use crate::schema::SchemaRegistry;
use super::database::Database;
use super::state::{MigrationState, TablePhase, TableProgress};
use super::storage::{open_storage, StorageFallback, StorageLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAction {
    Unchanged,
    Reindexed,
    Created,
    Rebuilt,
    RebuiltAsDependent,
    LeftDrifted,
    /// Introspection failed; nothing was touched.
    Skipped,
}

impl TableAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableAction::Unchanged => "unchanged",
            TableAction::Reindexed => "reindexed",
            TableAction::Created => "created",
            TableAction::Rebuilt => "rebuilt",
            TableAction::RebuiltAsDependent => "rebuilt (dependent)",
            TableAction::LeftDrifted => "left drifted",
            TableAction::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub status: DriftStatus,
    pub reasons: Vec<String>,
    pub action: TableAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub tables: Vec<TableOutcome>,
    pub plans: Vec<MigrationPlan>,
    pub log: ExecutionLog,
}

impl PassReport {
    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table.eq_ignore_ascii_case(table))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: Mode,
    pub drift_policy: DriftPolicy,
    pub location: StorageLocation,
    pub fallbacks: Vec<StorageFallback>,
    /// `None` when the pass was suppressed by an initialized `MigrationState`.
    pub pass: Option<PassReport>,
}

impl BootstrapReport {
    pub fn ran(&self) -> bool {
        self.pass.is_some()
    }

    pub fn drops(&self) -> usize {
        self.pass.as_ref().map(|p| p.log.drops()).unwrap_or(0)
    }

    pub fn creates(&self) -> usize {
        self.pass.as_ref().map(|p| p.log.creates()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum PlanDecision {
    Unchanged,
    Inconclusive,
    Reindex(MigrationPlan),
    Apply(MigrationPlan),
    Refuse(Vec<String>),
    Leave,
    /// Rebuilt by an earlier table's cascade.
    Covered,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedTable {
    pub drift: DriftReport,
    pub decision: PlanDecision,
}

pub struct Bootstrapper {
    config: BootstrapConfig,
    registry: SchemaRegistry,
    graph: DependencyGraph,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig) -> Result<Self> {
        Self::with_registry(config, SchemaRegistry::job_board())
    }

    pub fn with_registry(config: BootstrapConfig, registry: SchemaRegistry) -> Result<Self> {
        config.validate()?;
        let graph = DependencyGraph::from_registry(&registry)?;
        Ok(Self {
            config,
            registry,
            graph,
        })
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Opens storage and brings the schema to its declared shape.
    ///
    /// With an initialized `state` the pass is skipped and the existing handle
    /// is returned, unless a re-run was forced in development mode. The state
    /// must carry the configured mode (see `MigrationState::for_config`).
    pub fn bootstrap(&self, state: &mut MigrationState) -> Result<(Database, BootstrapReport)> {
        let started_at = Utc::now();

        if state.mode() != self.config.mode {
            return Err(Error::Config(format!(
                "migration state is in {} mode but the process is configured for {}",
                state.mode().as_str(),
                self.config.mode.as_str()
            )));
        }

        if let (false, Some(database)) = (state.should_run(), state.database()) {
            if state.rerun_requested() {
                warn!("Ignoring forced schema re-run in {} mode", self.config.mode.as_str());
            }
            debug!("Schema bootstrap already ran in this process; reusing the handle");
            let report = BootstrapReport {
                started_at,
                finished_at: Utc::now(),
                mode: self.config.mode,
                drift_policy: self.config.drift_policy,
                location: database.location().clone(),
                fallbacks: Vec::new(),
                pass: None,
            };
            return Ok((database.clone(), report));
        }

        let (database, fallbacks) = match state.database() {
            Some(database) => (database.clone(), Vec::new()),
            None => {
                let opened = open_storage(&self.config)?;
                (Database::new(opened.conn, opened.location), opened.fallbacks)
            }
        };

        info!("Verifying schema of {} tables at {}", self.registry.len(), database.location());
        let pass = database.with_conn(|conn| self.reconcile(conn, &SqliteCatalog::new(conn)))?;
        info!(
            "Schema bootstrap complete: {} dropped, {} created",
            pass.log.drops(),
            pass.log.creates()
        );

        state.mark_initialized(database.clone());

        let report = BootstrapReport {
            started_at,
            finished_at: Utc::now(),
            mode: self.config.mode,
            drift_policy: self.config.drift_policy,
            location: database.location().clone(),
            fallbacks,
            pass: Some(pass),
        };
        Ok((database, report))
    }

    pub fn decide(&self, drift: &DriftReport) -> Result<PlanDecision> {
        let decision = match drift.status {
            DriftStatus::Inconclusive => PlanDecision::Inconclusive,
            DriftStatus::Stable if drift.needs_reindex() => {
                PlanDecision::Reindex(MigrationPlan::reindex(&drift.table))
            }
            DriftStatus::Stable => PlanDecision::Unchanged,
            DriftStatus::Absent | DriftStatus::Drifted => match self.config.drift_policy {
                DriftPolicy::Rebuild => {
                    PlanDecision::Apply(MigrationPlan::rebuild(&drift.table, &self.graph)?)
                }
                _ if drift.status == DriftStatus::Absent => {
                    PlanDecision::Apply(MigrationPlan::create(&drift.table))
                }
                DriftPolicy::Refuse => PlanDecision::Refuse(drift.reason_messages()),
                DriftPolicy::ReportOnly => PlanDecision::Leave,
            },
        };
        Ok(decision)
    }

    /// Runs the per-table state machine over the registry in declaration order.
    pub fn reconcile(&self, conn: &Connection, catalog: &dyn Catalog) -> Result<PassReport> {
        let detector = DriftDetector::new(catalog);
        let mut executor = MigrationExecutor::new(conn);
        let mut pass = PassReport::default();
        let mut rebuilt: HashSet<String> = HashSet::new();

        for table in self.registry.tables() {
            if rebuilt.contains(&table.name) {
                debug!("Table '{}' was rebuilt with an earlier cascade", table.name);
                pass.tables.push(TableOutcome {
                    table: table.name.clone(),
                    status: DriftStatus::Stable,
                    reasons: Vec::new(),
                    action: TableAction::RebuiltAsDependent,
                });
                continue;
            }

            let mut progress = TableProgress::new(&table.name);
            let drift = detector.detect(table);

            let action = match self.decide(&drift)? {
                PlanDecision::Unchanged => {
                    progress.advance(TablePhase::Stable)?;
                    TableAction::Unchanged
                }
                PlanDecision::Inconclusive => {
                    progress.advance(TablePhase::Stable)?;
                    TableAction::Skipped
                }
                PlanDecision::Reindex(plan) => {
                    progress.advance(TablePhase::Stable)?;
                    info!(
                        "Recreating missing indexes on '{}': {}",
                        table.name,
                        drift.missing_indexes.join(", ")
                    );
                    executor.apply(&plan, &self.registry)?;
                    pass.plans.push(plan);
                    TableAction::Reindexed
                }
                PlanDecision::Refuse(reasons) => {
                    return Err(Error::DriftRefused {
                        table: table.name.clone(),
                        reasons,
                    });
                }
                PlanDecision::Leave => {
                    warn!(
                        "Table '{}' drifted ({}); leaving it in place",
                        table.name,
                        drift.reason_messages().join("; ")
                    );
                    TableAction::LeftDrifted
                }
                PlanDecision::Covered => TableAction::RebuiltAsDependent,
                PlanDecision::Apply(plan) => {
                    progress.advance(TablePhase::DriftConfirmed)?;
                    progress.advance(TablePhase::CascadeTargetsKnown)?;
                    if !plan.drops_table(&table.name) {
                        progress.advance(TablePhase::Dropped)?;
                    }

                    let live_drops = self.live_tables(catalog, &plan.drops());
                    if live_drops.is_empty() {
                        info!(
                            "Creating missing table '{}' with {} dependent table(s)",
                            table.name,
                            plan.dependents().len()
                        );
                    } else {
                        info!(
                            "Table '{}' drifted ({}); rebuilding it with {} dependent table(s)",
                            table.name,
                            drift.reason_messages().join("; "),
                            plan.dependents().len()
                        );
                        if self.config.mode == Mode::Production {
                            warn!(
                                "Rebuilding {} in production discards all rows in: {}",
                                table.name,
                                live_drops.join(", ")
                            );
                        }
                    }

                    executor.apply_with(&plan, &self.registry, |step| progress.observe(step))?;
                    progress.finish()?;
                    self.verify(&detector, &plan)?;

                    rebuilt.extend(plan.dependents().into_iter().map(String::from));
                    let action = if live_drops.is_empty() {
                        TableAction::Created
                    } else {
                        TableAction::Rebuilt
                    };
                    pass.plans.push(plan);
                    action
                }
            };

            pass.tables.push(TableOutcome {
                table: table.name.clone(),
                status: drift.status,
                reasons: drift.reason_messages(),
                action,
            });
        }

        pass.log = executor.into_log();
        Ok(pass)
    }

    /// The subset of `tables` present before the plan runs. A catalog error
    /// counts the table as present so the data-loss warning is not lost.
    fn live_tables(&self, catalog: &dyn Catalog, tables: &[&str]) -> Vec<String> {
        tables
            .iter()
            .filter(|t| catalog.table_exists(t).unwrap_or(true))
            .map(|t| t.to_string())
            .collect()
    }

    /// A repaired table must detect as stable with every index present.
    fn verify(&self, detector: &DriftDetector<'_>, plan: &MigrationPlan) -> Result<()> {
        for name in plan.recreates() {
            let definition = self
                .registry
                .get(name)
                .ok_or_else(|| Error::UnknownTable(name.to_string()))?;
            let check = detector.detect(definition);
            if check.is_drifted() || check.needs_reindex() {
                let mut problems = check.reason_messages();
                problems.extend(check.missing_indexes.iter().map(|i| format!("missing index '{}'", i)));
                return Err(Error::migration(
                    name,
                    format!("still drifted after rebuild: {}", problems.join("; ")),
                ));
            }
        }
        Ok(())
    }

    /// What `reconcile` would do, without executing anything.
    pub fn dry_run(&self, catalog: &dyn Catalog) -> Result<Vec<PlannedTable>> {
        let detector = DriftDetector::new(catalog);
        let mut covered: HashSet<String> = HashSet::new();
        let mut planned = Vec::new();

        for table in self.registry.tables() {
            let drift = detector.detect(table);
            let decision = if covered.contains(&table.name) {
                PlanDecision::Covered
            } else {
                self.decide(&drift)?
            };
            if let PlanDecision::Apply(plan) = &decision {
                covered.extend(plan.dependents().into_iter().map(String::from));
            }
            planned.push(PlannedTable { drift, decision });
        }
        Ok(planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::LiveColumn;

    fn bootstrapper(policy: DriftPolicy) -> Bootstrapper {
        Bootstrapper::new(BootstrapConfig::default().with_drift_policy(policy)).unwrap()
    }

    fn healthy() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        for table in SchemaRegistry::job_board().tables() {
            conn.execute_batch(&table.create_sql()).unwrap();
            for sql in table.index_sql() {
                conn.execute_batch(&sql).unwrap();
            }
        }
        conn
    }

    struct BrokenCatalog;

    impl Catalog for BrokenCatalog {
        fn table_exists(&self, table: &str) -> Result<bool> {
            Err(Error::introspection(table, "catalog unavailable"))
        }
        fn columns(&self, _table: &str) -> Result<Vec<LiveColumn>> {
            Ok(Vec::new())
        }
        fn table_sql(&self, _table: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn index_names(&self, _table: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_empty_database_is_created_in_one_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        let pass = bootstrapper(DriftPolicy::Rebuild)
            .reconcile(&conn, &SqliteCatalog::new(&conn))
            .unwrap();

        assert_eq!(pass.plans.len(), 1);
        assert_eq!(pass.outcome("users").unwrap().action, TableAction::Created);
        assert_eq!(pass.outcome("saved_jobs").unwrap().action, TableAction::RebuiltAsDependent);
        assert_eq!(pass.log.creates(), 8);
        assert_eq!(pass.log.drops(), 0);
    }

    #[test]
    fn test_refuse_policy_creates_absent_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let pass = bootstrapper(DriftPolicy::Refuse)
            .reconcile(&conn, &SqliteCatalog::new(&conn))
            .unwrap();

        assert_eq!(pass.log.drops(), 0);
        assert_eq!(pass.log.creates(), 8);
        assert!(pass.tables.iter().all(|t| t.action == TableAction::Created));
    }

    #[test]
    fn test_refuse_policy_aborts_on_shape_drift() {
        let conn = healthy();
        conn.execute_batch("ALTER TABLE jobs DROP COLUMN location").unwrap();

        let result = bootstrapper(DriftPolicy::Refuse).reconcile(&conn, &SqliteCatalog::new(&conn));
        match result {
            Err(Error::DriftRefused { table, reasons }) => {
                assert_eq!(table, "jobs");
                assert_eq!(reasons, vec!["missing column 'location'"]);
            }
            other => panic!("expected refusal, got {:?}", other.map(|p| p.tables.len())),
        }
    }

    #[test]
    fn test_report_only_leaves_drift() {
        let conn = healthy();
        conn.execute_batch("ALTER TABLE jobs DROP COLUMN location").unwrap();

        let pass = bootstrapper(DriftPolicy::ReportOnly)
            .reconcile(&conn, &SqliteCatalog::new(&conn))
            .unwrap();
        assert!(pass.log.is_empty());
        assert_eq!(pass.outcome("jobs").unwrap().action, TableAction::LeftDrifted);
    }

    #[test]
    fn test_missing_index_is_reindexed_without_drops() {
        let conn = healthy();
        conn.execute_batch("DROP INDEX idx_jobs_status").unwrap();

        let pass = bootstrapper(DriftPolicy::Rebuild)
            .reconcile(&conn, &SqliteCatalog::new(&conn))
            .unwrap();
        assert_eq!(pass.log.drops(), 0);
        assert_eq!(pass.outcome("jobs").unwrap().action, TableAction::Reindexed);
        assert!(SqliteCatalog::new(&conn)
            .index_names("jobs")
            .unwrap()
            .contains(&"idx_jobs_status".to_string()));
    }

    #[test]
    fn test_broken_catalog_touches_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let pass = bootstrapper(DriftPolicy::Rebuild).reconcile(&conn, &BrokenCatalog).unwrap();

        assert!(pass.log.is_empty());
        assert!(pass.tables.iter().all(|t| t.action == TableAction::Skipped));
    }

    #[test]
    fn test_dry_run_marks_covered_dependents() {
        let conn = healthy();
        conn.execute_batch("ALTER TABLE jobs DROP COLUMN location").unwrap();

        let planned = bootstrapper(DriftPolicy::Rebuild)
            .dry_run(&SqliteCatalog::new(&conn))
            .unwrap();
        let decision = |name: &str| &planned.iter().find(|p| p.drift.table == name).unwrap().decision;

        assert!(matches!(decision("users"), PlanDecision::Unchanged));
        assert!(matches!(decision("jobs"), PlanDecision::Apply(_)));
        assert!(matches!(decision("applications"), PlanDecision::Covered));

        let catalog = SqliteCatalog::new(&conn);
        assert!(!DriftDetector::new(&catalog).column_exists("jobs", "location").unwrap());
    }
}
