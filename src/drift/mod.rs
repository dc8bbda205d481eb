mod catalog;
mod constraint;
mod state;
mod detector;

pub use catalog::{Catalog, LiveColumn, SqliteCatalog};
pub use constraint::{ConstraintMatcher, LiveConstraints};
pub use state::{DriftReason, DriftReport, DriftStatus, SchemaDriftReport};
pub use detector::DriftDetector;
