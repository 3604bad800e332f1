use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

/// A whole-document row as stored by the sync server. Both payloads are kept
/// as opaque JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub history: String,
    pub targets: String,
    pub updated_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS app_data (
                    id TEXT PRIMARY KEY,
                    history TEXT NOT NULL,
                    targets TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Key/value storage (local cache) ---

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write key '{key}'"))?;
        Ok(())
    }

    /// Write several keys in one transaction so a crash cannot leave them
    /// out of step with each other.
    pub fn set_values(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write key '{key}'"))?;
        }
        tx.commit()?;
        Ok(())
    }

    // --- Whole-document storage (sync server) ---

    pub fn get_document(&self, id: &str) -> Result<Option<StoredDocument>> {
        self.conn
            .query_row(
                "SELECT history, targets, updated_at FROM app_data WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredDocument {
                        history: row.get(0)?,
                        targets: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to read sync document")
    }

    pub fn upsert_document(&self, id: &str, history: &str, targets: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO app_data (id, history, targets, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    history = excluded.history,
                    targets = excluded.targets,
                    updated_at = excluded.updated_at",
                params![id, history, targets, now],
            )
            .context("Failed to write sync document")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_value() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_value("nope").unwrap().is_none());
    }

    #[test]
    fn test_set_value_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.set_value("targets", "{}").unwrap();
        db.set_value("targets", "{\"calories\":1}").unwrap();
        assert_eq!(
            db.get_value("targets").unwrap().as_deref(),
            Some("{\"calories\":1}")
        );
    }

    #[test]
    fn test_set_values_writes_all_keys() {
        let mut db = Database::open_in_memory().unwrap();
        db.set_values(&[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(db.get_value("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.get_value("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_document_upsert_replaces_whole_row() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_document("user_1").unwrap().is_none());

        db.upsert_document("user_1", "{\"2024-01-01\":{}}", "{\"calories\":2000}")
            .unwrap();
        db.upsert_document("user_1", "{}", "{\"calories\":1800}")
            .unwrap();

        let doc = db.get_document("user_1").unwrap().unwrap();
        assert_eq!(doc.history, "{}");
        assert_eq!(doc.targets, "{\"calories\":1800}");
        assert!(!doc.updated_at.is_empty());
    }

    #[test]
    fn test_open_file_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let db = Database::open(&path).unwrap();
            db.set_value("k", "v").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_value("k").unwrap().as_deref(), Some("v"));
    }
}
