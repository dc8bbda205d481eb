use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use super::storage::StorageLocation;

/// Schema-verified handle shared with request handlers.
///
/// Handed out only after a successful bootstrap pass. Carries no schema
/// mutation entry points.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: StorageLocation,
}

impl Database {
    pub(crate) fn new(conn: Connection, location: StorageLocation) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        }
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn is_durable(&self) -> bool {
        self.location.is_durable()
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }
}
