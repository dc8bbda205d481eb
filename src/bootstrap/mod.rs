mod storage;
mod database;
mod state;
mod bootstrapper;

pub use storage::{
    OpenedStorage, StorageFallback, StorageLocation, open_existing, open_file, open_in_memory,
    open_storage, resolve_directory,
};
pub use database::Database;
pub use state::{MigrationState, TablePhase, TableProgress};
pub use bootstrapper::{
    BootstrapReport, Bootstrapper, PassReport, PlanDecision, PlannedTable, TableAction,
    TableOutcome,
};
