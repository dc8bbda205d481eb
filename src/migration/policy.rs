use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What the bootstrapper does with a table whose live shape drifted.
///
/// Absent tables are created under every policy, and missing indexes are
/// always recreated; only destructive rebuilds are gated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Drop the table and its dependents, then recreate them. Discards rows.
    #[default]
    Rebuild,
    /// Abort startup.
    Refuse,
    /// Log the drift and leave the table as it is.
    ReportOnly,
}

impl DriftPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftPolicy::Rebuild => "rebuild",
            DriftPolicy::Refuse => "refuse",
            DriftPolicy::ReportOnly => "report_only",
        }
    }
}

impl FromStr for DriftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "rebuild" => Ok(DriftPolicy::Rebuild),
            "refuse" => Ok(DriftPolicy::Refuse),
            "report_only" | "report" => Ok(DriftPolicy::ReportOnly),
            other => Err(format!(
                "unknown drift policy '{}' (expected rebuild, refuse or report-only)",
                other
            )),
        }
    }
}
