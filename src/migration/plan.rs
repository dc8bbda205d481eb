use serde::Serialize;
use std::fmt;
use crate::dependency::DependencyGraph;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAction {
    DropCascade,
    Recreate,
    ReindexOnly,
}

impl MigrationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationAction::DropCascade => "drop",
            MigrationAction::Recreate => "recreate",
            MigrationAction::ReindexOnly => "reindex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    pub table: String,
    pub action: MigrationAction,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.as_str(), self.table)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    pub target: String,
    pub steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            steps: Vec::new(),
        }
    }

    fn push(&mut self, table: impl Into<String>, action: MigrationAction) {
        self.steps.push(MigrationStep {
            table: table.into(),
            action,
        });
    }

    /// Drop dependents deepest first and then the target, recreate in the
    /// reverse order, then rebuild indexes.
    pub fn rebuild(target: &str, graph: &DependencyGraph) -> Result<Self> {
        let drop_order = graph.drop_order_for(target)?;
        let mut plan = Self::new(drop_order.last().cloned().unwrap_or_else(|| target.to_string()));

        for table in &drop_order {
            plan.push(table, MigrationAction::DropCascade);
        }
        for table in drop_order.iter().rev() {
            plan.push(table, MigrationAction::Recreate);
        }
        for table in drop_order.iter().rev() {
            plan.push(table, MigrationAction::ReindexOnly);
        }
        Ok(plan)
    }

    /// Create an absent table without touching its dependents.
    pub fn create(target: &str) -> Self {
        let mut plan = Self::new(target);
        plan.push(target, MigrationAction::Recreate);
        plan.push(target, MigrationAction::ReindexOnly);
        plan
    }

    pub fn reindex(target: &str) -> Self {
        let mut plan = Self::new(target);
        plan.push(target, MigrationAction::ReindexOnly);
        plan
    }

    fn tables_for(&self, action: MigrationAction) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action == action)
            .map(|s| s.table.as_str())
            .collect()
    }

    pub fn drops(&self) -> Vec<&str> {
        self.tables_for(MigrationAction::DropCascade)
    }

    pub fn recreates(&self) -> Vec<&str> {
        self.tables_for(MigrationAction::Recreate)
    }

    pub fn is_destructive(&self) -> bool {
        !self.drops().is_empty()
    }

    pub fn drops_table(&self, table: &str) -> bool {
        self.drops().iter().any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Tables rebuilt alongside the target.
    pub fn dependents(&self) -> Vec<&str> {
        self.recreates()
            .into_iter()
            .filter(|t| !t.eq_ignore_ascii_case(&self.target))
            .collect()
    }
}
