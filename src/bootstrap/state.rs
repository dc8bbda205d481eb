use serde::Serialize;
use crate::config::{BootstrapConfig, Mode};
use crate::error::{Error, Result};
use crate::migration::{MigrationAction, MigrationStep};
use super::database::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TablePhase {
    NotChecked,
    DriftConfirmed,
    CascadeTargetsKnown,
    Dropped,
    Recreated,
    Stable,
}

impl TablePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TablePhase::NotChecked => "not_checked",
            TablePhase::DriftConfirmed => "drift_confirmed",
            TablePhase::CascadeTargetsKnown => "cascade_targets_known",
            TablePhase::Dropped => "dropped",
            TablePhase::Recreated => "recreated",
            TablePhase::Stable => "stable",
        }
    }

    pub fn can_advance_to(&self, next: TablePhase) -> bool {
        use TablePhase::*;
        matches!(
            (self, next),
            (NotChecked, Stable)
                | (NotChecked, DriftConfirmed)
                | (DriftConfirmed, CascadeTargetsKnown)
                | (CascadeTargetsKnown, Dropped)
                | (Dropped, Recreated)
                | (Recreated, Stable)
        )
    }
}

/// Per-table walk through the bootstrap state machine.
#[derive(Debug, Clone)]
pub struct TableProgress {
    table: String,
    phase: TablePhase,
}

impl TableProgress {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            phase: TablePhase::NotChecked,
        }
    }

    pub fn phase(&self) -> TablePhase {
        self.phase
    }

    pub fn advance(&mut self, next: TablePhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                table: self.table.clone(),
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Moves the target through the phase an executed plan step implies.
    /// Steps on other tables leave it untouched.
    pub fn observe(&mut self, step: &MigrationStep) -> Result<()> {
        if !step.table.eq_ignore_ascii_case(&self.table) {
            return Ok(());
        }
        match step.action {
            MigrationAction::DropCascade => self.advance(TablePhase::Dropped),
            MigrationAction::Recreate => self.advance(TablePhase::Recreated),
            MigrationAction::ReindexOnly if self.phase == TablePhase::Recreated => {
                self.advance(TablePhase::Stable)
            }
            MigrationAction::ReindexOnly => Ok(()),
        }
    }

    /// Errors unless the walk reached `Stable`.
    pub fn finish(&self) -> Result<()> {
        if self.phase != TablePhase::Stable {
            return Err(Error::migration(
                &self.table,
                format!("plan finished with the table in phase '{}'", self.phase.as_str()),
            ));
        }
        Ok(())
    }
}

/// Run-once guard for the bootstrap pass, owned by the process entry point.
///
/// Holds the handle produced by the first pass so later calls reuse it
/// instead of reopening storage.
#[derive(Debug)]
pub struct MigrationState {
    mode: Mode,
    passes: u32,
    force: bool,
    database: Option<Database>,
}

impl MigrationState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            passes: 0,
            force: false,
            database: None,
        }
    }

    /// The state for a process configured by `config`; the mode is taken from it.
    pub fn for_config(config: &BootstrapConfig) -> Self {
        Self::new(config.mode)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn is_initialized(&self) -> bool {
        self.database.is_some()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Request another pass on the next bootstrap. Honored in development only.
    pub fn force_rerun(&mut self) {
        self.force = true;
    }

    pub fn rerun_requested(&self) -> bool {
        self.force
    }

    pub fn should_run(&self) -> bool {
        !self.is_initialized() || (self.force && self.mode == Mode::Development)
    }

    pub(crate) fn mark_initialized(&mut self, database: Database) {
        self.passes += 1;
        self.force = false;
        self.database = Some(database);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::StorageLocation;
    use rusqlite::Connection;

    fn step(table: &str, action: MigrationAction) -> MigrationStep {
        MigrationStep {
            table: table.to_string(),
            action,
        }
    }

    #[test]
    fn test_rebuild_walk() {
        let mut progress = TableProgress::new("jobs");
        progress.advance(TablePhase::DriftConfirmed).unwrap();
        progress.advance(TablePhase::CascadeTargetsKnown).unwrap();
        progress.observe(&step("applications", MigrationAction::DropCascade)).unwrap();
        assert_eq!(progress.phase(), TablePhase::CascadeTargetsKnown);
        progress.observe(&step("jobs", MigrationAction::DropCascade)).unwrap();
        progress.observe(&step("jobs", MigrationAction::Recreate)).unwrap();
        progress.observe(&step("jobs", MigrationAction::ReindexOnly)).unwrap();
        assert_eq!(progress.phase(), TablePhase::Stable);
        progress.finish().unwrap();
    }

    #[test]
    fn test_unfinished_walk_is_an_error() {
        let mut progress = TableProgress::new("jobs");
        progress.advance(TablePhase::DriftConfirmed).unwrap();
        progress.advance(TablePhase::CascadeTargetsKnown).unwrap();
        progress.observe(&step("jobs", MigrationAction::DropCascade)).unwrap();
        progress.observe(&step("jobs", MigrationAction::Recreate)).unwrap();

        let err = progress.finish().unwrap_err();
        assert!(matches!(err, Error::Migration { ref table, .. } if table == "jobs"));
    }

    #[test]
    fn test_state_takes_mode_from_config() {
        let config = BootstrapConfig::default().with_mode(Mode::Production);
        assert_eq!(MigrationState::for_config(&config).mode(), Mode::Production);
    }

    #[test]
    fn test_recreate_before_drop_rejected() {
        let mut progress = TableProgress::new("jobs");
        progress.advance(TablePhase::DriftConfirmed).unwrap();
        let err = progress.advance(TablePhase::Recreated).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: "drift_confirmed", to: "recreated", .. }));
    }

    #[test]
    fn test_force_ignored_in_production() {
        let db = Database::new(Connection::open_in_memory().unwrap(), StorageLocation::InMemory);

        let mut prod = MigrationState::new(Mode::Production);
        assert!(prod.should_run());
        prod.mark_initialized(db.clone());
        prod.force_rerun();
        assert!(!prod.should_run());

        let mut dev = MigrationState::new(Mode::Development);
        dev.mark_initialized(db);
        assert!(!dev.should_run());
        dev.force_rerun();
        assert!(dev.should_run());
    }
}
