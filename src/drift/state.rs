use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Stable,
    Drifted,
    Absent,
    /// Introspection failed; treated as drift-free.
    Inconclusive,
}

impl DriftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftStatus::Stable => "stable",
            DriftStatus::Drifted => "drifted",
            DriftStatus::Absent => "absent",
            DriftStatus::Inconclusive => "inconclusive",
        }
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self, DriftStatus::Drifted | DriftStatus::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftReason {
    TableAbsent,
    MissingColumn { column: String },
    MissingConstraint { constraint: String },
    IntrospectionFailed { message: String },
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftReason::TableAbsent => write!(f, "table does not exist"),
            DriftReason::MissingColumn { column } => write!(f, "missing column '{}'", column),
            DriftReason::MissingConstraint { constraint } => {
                write!(f, "constraint not found: {}", constraint)
            }
            DriftReason::IntrospectionFailed { message } => {
                write!(f, "introspection failed: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub table: String,
    pub status: DriftStatus,
    pub reasons: Vec<DriftReason>,
    /// Declared indexes absent from the live catalog. Not drift on their own.
    pub missing_indexes: Vec<String>,
}

impl DriftReport {
    pub fn stable(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            status: DriftStatus::Stable,
            reasons: Vec::new(),
            missing_indexes: Vec::new(),
        }
    }

    pub fn absent(table: impl Into<String>) -> Self {
        Self {
            status: DriftStatus::Absent,
            reasons: vec![DriftReason::TableAbsent],
            ..Self::stable(table)
        }
    }

    pub fn inconclusive(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: DriftStatus::Inconclusive,
            reasons: vec![DriftReason::IntrospectionFailed { message: message.into() }],
            ..Self::stable(table)
        }
    }

    pub fn is_drifted(&self) -> bool {
        self.status.is_drifted()
    }

    pub fn needs_reindex(&self) -> bool {
        !self.missing_indexes.is_empty()
    }

    pub fn reason_messages(&self) -> Vec<String> {
        self.reasons.iter().map(|r| r.to_string()).collect()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SchemaDriftReport {
    pub tables: Vec<DriftReport>,
}

impl SchemaDriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, report: DriftReport) {
        self.tables.push(report);
    }

    pub fn get(&self, table: &str) -> Option<&DriftReport> {
        self.tables.iter().find(|r| r.table.eq_ignore_ascii_case(table))
    }

    pub fn drifted(&self) -> Vec<&DriftReport> {
        self.tables.iter().filter(|r| r.is_drifted()).collect()
    }

    pub fn is_stable(&self) -> bool {
        self.tables.iter().all(|r| !r.is_drifted())
    }

    pub fn summary(&self) -> HashMap<DriftStatus, usize> {
        let mut counts: HashMap<DriftStatus, usize> = HashMap::new();
        for r in &self.tables {
            *counts.entry(r.status).or_default() += 1;
        }
        counts
    }
}
