use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::errors::CrmResult;

/// Durable key/value settings backed by a single sqlite table.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new(db_path: &Path) -> CrmResult<Self> {
        Self::init(Connection::open(db_path)?)
    }

    /// Nothing survives the process; used for session-only hosts and tests.
    pub fn in_memory() -> CrmResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CrmResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self { conn })
    }

    pub fn get_setting(&self, key: &str) -> CrmResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> CrmResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> CrmResult<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        {
            let storage = Storage::new(&path).unwrap();
            storage.put_setting("a", "1").unwrap();
            storage.put_setting("a", "2").unwrap();
        }
        let storage = Storage::new(&path).unwrap();
        assert_eq!(storage.get_setting("a").unwrap().as_deref(), Some("2"));
        storage.delete_setting("a").unwrap();
        assert_eq!(storage.get_setting("a").unwrap(), None);
    }
}
