use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

const DB_FILE_NAME: &str = "prefs.db";

/// Durable string key-value storage, partitioned by namespace.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the store inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir: {}", data_dir.display()))?;
        let db_path = data_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;

        let mut db = Self { conn };
        db.conn.pragma_update(None, "journal_mode", "WAL")?;
        db.setup()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let mut db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.setup()?;
        Ok(db)
    }

    fn setup(&mut self) -> Result<()> {
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS prefs (
              namespace TEXT NOT NULL,
              key       TEXT NOT NULL,
              value     TEXT NOT NULL,
              PRIMARY KEY (namespace, key)
            );
        "#,
        )?;
        Ok(())
    }

    pub fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM prefs WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO prefs (namespace, key, value) VALUES (?1, ?2, ?3)
            ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value
            "#,
            params![namespace, key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM prefs WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }
}

pub type SharedDatabase = Arc<Mutex<Database>>;

pub fn shared(db: Database) -> SharedDatabase {
    Arc::new(Mutex::new(db))
}

/// Handle scoped to one namespace of the shared store.
#[derive(Clone)]
pub struct Namespace {
    db: SharedDatabase,
    name: &'static str,
}

impl Namespace {
    pub fn new(db: SharedDatabase, name: &'static str) -> Self {
        Self { db, name }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self
            .db
            .lock()
            .map_err(|_| anyhow!("preference store lock poisoned"))?;
        f(&db)
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.with_db(|db| db.get(self.name, key))
            .with_context(|| format!("failed to read {}/{}", self.name, key))
    }

    pub fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.with_db(|db| db.put(self.name, key, value))
            .with_context(|| format!("failed to write {}/{}", self.name, key))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.with_db(|db| db.remove(self.name, key))
            .with_context(|| format!("failed to remove {}/{}", self.name, key))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key)?.as_deref() == Some("true"))
    }

    pub fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put_string(key, if value { "true" } else { "false" })
    }
}
