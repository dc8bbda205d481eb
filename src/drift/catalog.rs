use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// Read-only view of the live schema.
pub trait Catalog {
    fn table_exists(&self, table: &str) -> Result<bool>;

    fn columns(&self, table: &str) -> Result<Vec<LiveColumn>>;

    /// The stored `CREATE TABLE` text, `None` if the table is absent.
    fn table_sql(&self, table: &str) -> Result<Option<String>>;

    fn index_names(&self, table: &str) -> Result<Vec<String>>;
}

pub struct SqliteCatalog<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCatalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Catalog for SqliteCatalog<'_> {
    fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
            params![table],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn columns(&self, table: &str) -> Result<Vec<LiveColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let rows = stmt.query_map(params![table], |row| {
            Ok(LiveColumn {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? != 0,
            })
        })?;

        let mut columns = Vec::new();
        for column in rows {
            columns.push(column?);
        }
        Ok(columns)
    }

    fn table_sql(&self, table: &str) -> Result<Option<String>> {
        let sql: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sql.flatten())
    }

    fn index_names(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 COLLATE NOCASE",
        )?;
        let names = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}
