use serde::{Deserialize, Serialize};
use super::column::ColumnDefinition;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            OnDelete::NoAction => None,
            OnDelete::Cascade => Some("ON DELETE CASCADE"),
            OnDelete::SetNull => Some("ON DELETE SET NULL"),
            OnDelete::Restrict => Some("ON DELETE RESTRICT"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl ForeignKey {
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            self.column, self.referenced_table, self.referenced_column
        );
        if let Some(action) = self.on_delete.as_sql() {
            sql.push(' ');
            sql.push_str(action);
        }
        sql
    }
}

/// Directed dependency: `dependent` holds a foreign key into `referenced`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignKeyEdge {
    pub dependent: String,
    pub referenced: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn create_sql(&self, table: &str) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

/// A table-level constraint whose presence is verified against the live DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Check(String),
    Unique(Vec<String>),
}

impl Constraint {
    pub fn to_sql(&self) -> String {
        match self {
            Constraint::Check(expr) => format!("CHECK ({})", expr),
            Constraint::Unique(columns) => format!("UNIQUE ({})", columns.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.constraints.push(Constraint::Check(expr.into()));
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.constraints
            .push(Constraint::Unique(columns.iter().map(|c| c.to_string()).collect()));
        self
    }

    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: "id".to_string(),
            on_delete,
        });
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.matches_name(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Referenced tables in declaration order, without duplicates.
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for fk in &self.foreign_keys {
            if !tables.iter().any(|t| t.eq_ignore_ascii_case(&fk.referenced_table)) {
                tables.push(&fk.referenced_table);
            }
        }
        tables
    }

    pub fn edges(&self) -> Vec<ForeignKeyEdge> {
        self.referenced_tables()
            .into_iter()
            .map(|referenced| ForeignKeyEdge {
                dependent: self.name.clone(),
                referenced: referenced.to_string(),
            })
            .collect()
    }

    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.to_sql()).collect();
        parts.extend(self.constraints.iter().map(|c| c.to_sql()));
        parts.extend(self.foreign_keys.iter().map(|fk| fk.to_sql()));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }

    pub fn index_sql(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.create_sql(&self.name)).collect()
    }

    pub fn drop_sql(&self) -> String {
        drop_table_sql(&self.name)
    }
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}
