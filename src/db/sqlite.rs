use super::KeyValueStore;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {path}"))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;

        let mut store = Self { conn };
        store.migrate()?;

        Ok(store)
    }

    fn migrate(&mut self) -> Result<()> {
        const MIGRATIONS: &[&str] = &[include_str!("../../migrations/0001_create_kv.sql")];

        let version: u32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .context("Failed to read user_version")?;

        for (i, sql) in MIGRATIONS.iter().enumerate() {
            let target = (i + 1) as u32;
            if version < target {
                info!("Running database migration: v{} → v{}", target - 1, target);
                self.conn
                    .execute_batch(sql)
                    .with_context(|| format!("Migration v{} → v{} failed", target - 1, target))?;
                self.conn
                    .pragma_update(None, "user_version", target)
                    .with_context(|| format!("Failed to set user_version to {target}"))?;
            }
        }

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key '{key}'"))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE
                 SET value = excluded.value, updated_at = datetime('now')",
                [key, value],
            )
            .with_context(|| format!("Failed to write key '{key}'"))?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", [key])
            .with_context(|| format!("Failed to remove key '{key}'"))?;

        Ok(())
    }
}
