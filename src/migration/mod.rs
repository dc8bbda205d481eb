mod policy;
mod plan;
mod executor;

pub use policy::DriftPolicy;
pub use plan::{MigrationAction, MigrationPlan, MigrationStep};
pub use executor::{ExecutedStatement, ExecutionLog, MigrationExecutor, StatementKind};
