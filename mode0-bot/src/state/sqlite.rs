//! SQLite profile storage.

use super::storage::ProfileStorage;
use crate::error::{StorageError, StorageResult};
use crate::util::timestamp_ms;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const BACKEND: &str = "sqlite";

/// Profile storage in a single SQLite `users` table.
///
/// rusqlite is blocking, so every call runs on the blocking pool with the
/// connection behind a mutex.
#[derive(Clone)]
pub struct SqliteProfileStorage {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteProfileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProfileStorage").finish_non_exhaustive()
    }
}

impl SqliteProfileStorage {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Init`] if the file or schema cannot be set up.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                // A missing parent surfaces as an open error below.
                let _ = std::fs::create_dir_all(parent);
            }
            let conn = Connection::open(&path)?;
            Self::migrate(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StorageError::init(BACKEND, e.to_string()))?
        .map_err(|e| StorageError::init(BACKEND, format!("{shown}: {e}")))?;

        info!(path = %shown, "opened profile database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests and throwaway runs.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Init`] if the schema cannot be created.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::init(BACKEND, e.to_string()))?;
        Self::migrate(&conn).map_err(|e| StorageError::init(BACKEND, e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS users (
              user_id TEXT PRIMARY KEY,
              profile TEXT NOT NULL,
              updated_at INTEGER NOT NULL
            );
            ",
        )
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::unavailable(BACKEND, "connection mutex poisoned"))?;
            f(&guard).map_err(StorageError::from)
        })
        .await
        .map_err(|e| StorageError::unavailable(BACKEND, e.to_string()))?
    }
}

#[async_trait]
impl ProfileStorage for SqliteProfileStorage {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn load_profile(&self, user_id: &str) -> StorageResult<Option<String>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT profile FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    async fn save_profile(&self, user_id: &str, blob: &str) -> StorageResult<()> {
        if user_id.trim().is_empty() {
            return Err(StorageError::InvalidKey(user_id.to_string()));
        }
        let owned_id = user_id.to_string();
        let blob = blob.to_string();
        let now = i64::try_from(timestamp_ms()).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, profile, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET profile = excluded.profile, updated_at = excluded.updated_at",
                params![owned_id, blob, now],
            )
            .map(|_| ())
        })
        .await?;
        debug!(user_id, "saved profile to sqlite");
        Ok(())
    }

    async fn list_profiles(&self) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UserState;

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let storage = SqliteProfileStorage::open_in_memory().unwrap();
        assert!(storage.load_profile("42").await.unwrap().is_none());

        let mut state = UserState::new("42");
        state.message_count = 3;
        state.add_interests(["coding"]);
        storage.save_profile("42", &state.to_blob().unwrap()).await.unwrap();

        state.message_count = 4;
        storage.save_profile("42", &state.to_blob().unwrap()).await.unwrap();

        let blob = storage.load_profile("42").await.unwrap().unwrap();
        assert_eq!(UserState::from_blob(&blob).unwrap(), state);
        assert_eq!(storage.list_profiles().await.unwrap(), vec!["42"]);
    }

    #[tokio::test]
    async fn test_sqlite_open_file() {
        let path = std::env::temp_dir().join(format!(
            "mode0-sqlite-{}-{}/users.db",
            std::process::id(),
            timestamp_ms()
        ));
        let storage = SqliteProfileStorage::open(&path).await.unwrap();
        storage.save_profile("7", r#"{"user_id":"7"}"#).await.unwrap();
        drop(storage);

        let reopened = SqliteProfileStorage::open(&path).await.unwrap();
        assert!(reopened.load_profile("7").await.unwrap().is_some());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_sqlite_open_failure_is_init_error() {
        let err = SqliteProfileStorage::open("/proc/mode0-definitely-not-writable/users.db")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Init { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_rejects_empty_key() {
        let storage = SqliteProfileStorage::open_in_memory().unwrap();
        assert!(matches!(
            storage.save_profile("", "{}").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
