pub mod error;
pub mod config;
pub mod schema;
pub mod drift;
pub mod dependency;
pub mod migration;
pub mod bootstrap;
pub mod diff;

pub use error::{Error, Result};
pub use config::{BootstrapConfig, JournalMode, Mode};
pub use schema::{
    ColumnDefinition, Constraint, ForeignKey, ForeignKeyEdge, IndexDefinition, OnDelete,
    SchemaRegistry, SqlType, TableDefinition,
};
pub use drift::{
    Catalog, ConstraintMatcher, DriftDetector, DriftReason, DriftReport, DriftStatus, LiveColumn,
    SchemaDriftReport, SqliteCatalog,
};
pub use dependency::DependencyGraph;
pub use migration::{
    DriftPolicy, ExecutionLog, MigrationAction, MigrationExecutor, MigrationPlan, MigrationStep,
};
pub use bootstrap::{
    BootstrapReport, Bootstrapper, Database, MigrationState, PassReport, PlanDecision,
    PlannedTable, StorageFallback, StorageLocation, TableAction, TableOutcome, TablePhase,
};
pub use diff::{format_ddl_diff, has_changes, layout_ddl};
