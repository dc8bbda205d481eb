use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table '{table}' references undeclared table '{referenced}'")]
    UndeclaredReference { table: String, referenced: String },

    #[error("Foreign key cycle among tables: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Introspection of '{table}' failed: {message}")]
    Introspection { table: String, message: String },

    #[error("Migration error on '{table}': {message}")]
    Migration { table: String, message: String },

    #[error("Drift detected in '{table}' and the drift policy refuses to rebuild: {}", .reasons.join("; "))]
    DriftRefused { table: String, reasons: Vec<String> },

    #[error("Invalid transition for '{table}': {from} -> {to}")]
    InvalidTransition {
        table: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn migration(table: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Error::Migration {
            table: table.into(),
            message: source.to_string(),
        }
    }

    pub fn introspection(table: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Error::Introspection {
            table: table.into(),
            message: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
