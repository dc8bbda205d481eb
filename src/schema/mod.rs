mod column;
mod table;
mod registry;

pub use column::{ColumnDefinition, SqlType};
pub use table::{
    Constraint, ForeignKey, ForeignKeyEdge, IndexDefinition, OnDelete, TableDefinition,
    drop_table_sql,
};
pub use registry::SchemaRegistry;
