use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, params};
use serde_json::Value;

use crate::store::KvStore;

/// SQLite-backed key-value store. Each key holds one JSON document.
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
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn decode(key: &str, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).with_context(|| format!("Corrupt JSON stored under '{key}'"))
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            Ok(Some(Self::decode(key, &raw)?))
        } else {
            Ok(None)
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, raw, now],
        )?;
        Ok(())
    }

    fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv_store ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut all = BTreeMap::new();
        for row in rows {
            let (key, raw) = row?;
            match Self::decode(&key, &raw) {
                Ok(value) => {
                    all.insert(key, value);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping corrupt store value"),
            }
        }
        Ok(all)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM kv_store", [])?;
        Ok(())
    }
}
