use tracing::{debug, warn};
use crate::error::Result;
use crate::schema::{Constraint, SchemaRegistry, TableDefinition};
use super::catalog::Catalog;
use super::constraint::ConstraintMatcher;
use super::state::{DriftReason, DriftReport, DriftStatus, SchemaDriftReport};

pub struct DriftDetector<'a> {
    catalog: &'a dyn Catalog,
    matcher: ConstraintMatcher,
}

impl<'a> DriftDetector<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            matcher: ConstraintMatcher::new(),
        }
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.catalog.table_exists(table)
    }

    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .catalog
            .columns(table)?
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    pub fn constraint_present(&self, table: &str, constraint: &Constraint) -> Result<bool> {
        match self.catalog.table_sql(table)? {
            Some(ddl) => Ok(self.matcher.is_present(&ddl, constraint)),
            None => Ok(false),
        }
    }

    /// Never fails: an introspection error yields an `Inconclusive` report.
    pub fn detect(&self, table: &TableDefinition) -> DriftReport {
        match self.inspect(table) {
            Ok(report) => {
                debug!("Table '{}' is {}", table.name, report.status.as_str());
                report
            }
            Err(e) => {
                warn!(
                    "Could not introspect table '{}': {}. Treating it as drift-free",
                    table.name, e
                );
                DriftReport::inconclusive(&table.name, e.to_string())
            }
        }
    }

    pub fn detect_all(&self, registry: &SchemaRegistry) -> SchemaDriftReport {
        let mut report = SchemaDriftReport::new();
        for table in registry.tables() {
            report.add(self.detect(table));
        }
        report
    }

    fn inspect(&self, table: &TableDefinition) -> Result<DriftReport> {
        if !self.table_exists(&table.name)? {
            return Ok(DriftReport::absent(&table.name));
        }

        let mut reasons = Vec::new();

        let live_columns = self.catalog.columns(&table.name)?;
        for column in &table.columns {
            if !live_columns.iter().any(|c| column.matches_name(&c.name)) {
                reasons.push(DriftReason::MissingColumn {
                    column: column.name.clone(),
                });
            }
        }

        if let Some(ddl) = self.catalog.table_sql(&table.name)? {
            for constraint in &table.constraints {
                if !self.matcher.is_present(&ddl, constraint) {
                    reasons.push(DriftReason::MissingConstraint {
                        constraint: constraint.to_sql(),
                    });
                }
            }
        }

        let live_indexes = self.catalog.index_names(&table.name)?;
        let missing_indexes = table
            .indexes
            .iter()
            .filter(|i| !live_indexes.iter().any(|l| l.eq_ignore_ascii_case(&i.name)))
            .map(|i| i.name.clone())
            .collect();

        let status = if reasons.is_empty() {
            DriftStatus::Stable
        } else {
            DriftStatus::Drifted
        };

        Ok(DriftReport {
            table: table.name.clone(),
            status,
            reasons,
            missing_indexes,
        })
    }
}
