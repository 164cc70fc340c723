//! Persistent KV store (C7): namespaced JSON values backed by SQLite,
//! grounded on `iridite-tandem/crates/tandem-memory/src/db.rs`
//! (`Arc<Mutex<rusqlite::Connection>>`, WAL mode, busy timeout),
//! generalized with `tokio::task::spawn_blocking` so the blocking SQLite
//! calls never run on the async event loop.

use crate::error::{FabricResult, OrchestratorError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Namespace — a tuple of strings, joined with `/` for storage.
pub type Namespace = Vec<String>;

fn namespace_key(namespace: &Namespace) -> String {
    namespace.join("/")
}

/// SQLite-backed namespaced key/value store.
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
}

impl KvStore {
    /// Open (or create) the store at `path`, enabling WAL mode and a busy
    /// timeout so concurrent readers never block on a writer.
    pub fn open(path: impl AsRef<Path>) -> FabricResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )?;
        Ok(KvStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run_blocking<T, F>(&self, f: F) -> FabricResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> FabricResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("kv store mutex poisoned");
            f(&guard)
        })
        .await
        .map_err(|e| OrchestratorError::state(format!("kv store task join error: {e}")))?
    }

    /// Fetch `key` from `namespace`, or `None` if absent.
    pub async fn get(&self, namespace: Namespace, key: String) -> FabricResult<Option<serde_json::Value>> {
        self.run_blocking(move |conn| {
            with_retry(|| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                        params![namespace_key(&namespace), key],
                        |row| row.get(0),
                    )
                    .optional()?;
                match raw {
                    Some(s) => Ok(Some(serde_json::from_str(&s)?)),
                    None => Ok(None),
                }
            })
        })
        .await
    }

    /// Upsert `value` at `key` within `namespace`.
    pub async fn put(&self, namespace: Namespace, key: String, value: serde_json::Value) -> FabricResult<()> {
        self.run_blocking(move |conn| {
            with_retry(|| {
                let raw = serde_json::to_string(&value)?;
                conn.execute(
                    "INSERT INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                    params![namespace_key(&namespace), key, raw],
                )?;
                Ok(())
            })
        })
        .await
    }

    /// Delete `key` within `namespace`, if present.
    pub async fn delete(&self, namespace: Namespace, key: String) -> FabricResult<()> {
        self.run_blocking(move |conn| {
            with_retry(|| {
                conn.execute(
                    "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![namespace_key(&namespace), key],
                )?;
                Ok(())
            })
        })
        .await
    }

    /// List all keys in `namespace` whose key starts with `prefix`.
    pub async fn list(&self, namespace: Namespace, prefix: String) -> FabricResult<Vec<String>> {
        self.run_blocking(move |conn| {
            with_retry(|| {
                let mut stmt = conn.prepare(
                    "SELECT key FROM kv WHERE namespace = ?1 AND key LIKE ?2 ORDER BY key",
                )?;
                let like_pattern = format!("{prefix}%");
                let keys = stmt
                    .query_map(params![namespace_key(&namespace), like_pattern], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
        })
        .await
    }
}

/// Retry transient SQLite lock errors with bounded exponential backoff
/// (max 3 attempts).
fn with_retry<T>(mut op: impl FnMut() -> FabricResult<T>) -> FabricResult<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(OrchestratorError::State { message, data }) if attempt < 2 && message.contains("locked") => {
                attempt += 1;
                std::thread::sleep(Duration::from_millis(10 * 2u64.pow(attempt)));
                let _ = data;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}
