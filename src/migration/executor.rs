use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::schema::{SchemaRegistry, TableDefinition, drop_table_sql};
use super::plan::{MigrationAction, MigrationPlan, MigrationStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Drop,
    Create,
    Index,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedStatement {
    pub table: String,
    pub kind: StatementKind,
    pub sql: String,
}

/// Every DDL statement issued during a pass, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionLog {
    pub statements: Vec<ExecutedStatement>,
}

impl ExecutionLog {
    fn count(&self, kind: StatementKind) -> usize {
        self.statements.iter().filter(|s| s.kind == kind).count()
    }

    pub fn drops(&self) -> usize {
        self.count(StatementKind::Drop)
    }

    pub fn creates(&self) -> usize {
        self.count(StatementKind::Create)
    }

    pub fn indexes(&self) -> usize {
        self.count(StatementKind::Index)
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn dropped_tables(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.kind == StatementKind::Drop)
            .map(|s| s.table.as_str())
            .collect()
    }
}

/// The only component that issues destructive DDL.
pub struct MigrationExecutor<'c> {
    conn: &'c Connection,
    log: ExecutionLog,
}

impl<'c> MigrationExecutor<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            log: ExecutionLog::default(),
        }
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn into_log(self) -> ExecutionLog {
        self.log
    }

    fn run(&mut self, table: &str, kind: StatementKind, sql: String) -> Result<()> {
        debug!("{}", sql);
        self.conn
            .execute_batch(&sql)
            .map_err(|e| Error::migration(table, e))?;
        self.log.statements.push(ExecutedStatement {
            table: table.to_string(),
            kind,
            sql,
        });
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| Error::migration(table, e))?;
        Ok(exists)
    }

    /// Live tables other than `table` whose foreign keys point at it.
    fn live_referrers(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT m.name FROM sqlite_master m, pragma_foreign_key_list(m.name) f \
                 WHERE m.type = 'table' AND f.\"table\" = ?1 COLLATE NOCASE AND m.name <> ?1 COLLATE NOCASE",
            )
            .map_err(|e| Error::migration(table, e))?;
        let names = stmt
            .query_map(params![table], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
            .map_err(|e| Error::migration(table, e))?;
        Ok(names)
    }

    /// Drops in the given order; callers pass dependents first.
    ///
    /// Tables that do not exist are skipped and not logged. Dropping a table
    /// that a live table still references is an error, since SQLite would
    /// otherwise cascade the delete into the dependent and leave it dangling.
    pub fn drop_cascade(&mut self, ordered_tables: &[String]) -> Result<()> {
        for table in ordered_tables {
            if !self.table_exists(table)? {
                debug!("Table '{}' does not exist, nothing to drop", table);
                continue;
            }
            let referrers = self.live_referrers(table)?;
            if !referrers.is_empty() {
                return Err(Error::migration(
                    table,
                    format!(
                        "still referenced by {}; dependents must be dropped first",
                        referrers.join(", ")
                    ),
                ));
            }
            info!("Dropping table '{}'", table);
            self.run(table, StatementKind::Drop, drop_table_sql(table))?;
        }
        Ok(())
    }

    pub fn recreate(&mut self, table: &TableDefinition) -> Result<()> {
        info!("Creating table '{}'", table.name);
        self.run(&table.name, StatementKind::Create, table.create_sql())
    }

    pub fn reindex(&mut self, table: &TableDefinition) -> Result<()> {
        for sql in table.index_sql() {
            self.run(&table.name, StatementKind::Index, sql)?;
        }
        Ok(())
    }

    pub fn execute_step(&mut self, step: &MigrationStep, registry: &SchemaRegistry) -> Result<()> {
        let definition = registry
            .get(&step.table)
            .ok_or_else(|| Error::UnknownTable(step.table.clone()))?;

        match step.action {
            MigrationAction::DropCascade => self.drop_cascade(std::slice::from_ref(&definition.name)),
            MigrationAction::Recreate => self.recreate(definition),
            MigrationAction::ReindexOnly => self.reindex(definition),
        }
    }

    pub fn apply(&mut self, plan: &MigrationPlan, registry: &SchemaRegistry) -> Result<()> {
        self.apply_with(plan, registry, |_| Ok(()))
    }

    /// Runs the plan in one transaction; `after_step` sees each completed step.
    /// Any error rolls the whole plan back.
    pub fn apply_with<F>(
        &mut self,
        plan: &MigrationPlan,
        registry: &SchemaRegistry,
        mut after_step: F,
    ) -> Result<()>
    where
        F: FnMut(&MigrationStep) -> Result<()>,
    {
        let conn = self.conn;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::migration(&plan.target, e))?;

        for step in &plan.steps {
            self.execute_step(step, registry)?;
            after_step(step)?;
        }

        tx.commit().map_err(|e| Error::migration(&plan.target, e))
    }
}
