//! Profile storage backends.
//!
//! The store only ever sees opaque JSON blobs keyed by user id; encoding and
//! decoding live on [`UserState`](super::UserState).

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Trait for persistent profile stores.
#[async_trait]
pub trait ProfileStorage: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Load the blob stored for `user_id`.
    async fn load_profile(&self, user_id: &str) -> StorageResult<Option<String>>;

    /// Store `blob` for `user_id`, replacing any previous blob.
    async fn save_profile(&self, user_id: &str, blob: &str) -> StorageResult<()>;

    /// List every stored user id.
    async fn list_profiles(&self) -> StorageResult<Vec<String>>;
}

/// In-memory profile storage.
///
/// Not persistent across restarts.
#[derive(Debug, Default)]
pub struct MemoryProfileStorage {
    profiles: RwLock<HashMap<String, String>>,
}

impl MemoryProfileStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStorage for MemoryProfileStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_profile(&self, user_id: &str) -> StorageResult<Option<String>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save_profile(&self, user_id: &str, blob: &str) -> StorageResult<()> {
        self.profiles
            .write()
            .await
            .insert(user_id.to_string(), blob.to_string());
        Ok(())
    }

    async fn list_profiles(&self) -> StorageResult<Vec<String>> {
        Ok(self.profiles.read().await.keys().cloned().collect())
    }
}

/// File-based profile storage: one JSON file per user.
#[derive(Debug)]
pub struct FileProfileStorage {
    base_path: PathBuf,
}

impl FileProfileStorage {
    /// Create a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create the directory up front so a bad path fails at startup.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Init`] if the directory cannot be created.
    pub async fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let storage = Self::new(base_path);
        tokio::fs::create_dir_all(&storage.base_path)
            .await
            .map_err(|e| StorageError::init("file", format!("{}: {e}", storage.base_path.display())))?;
        Ok(storage)
    }

    /// File path for a user id. See [`encode_key`].
    fn profile_path(&self, user_id: &str) -> StorageResult<PathBuf> {
        if user_id.trim().is_empty() {
            return Err(StorageError::InvalidKey(user_id.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", encode_key(user_id))))
    }
}

/// Encode a user id as a file stem.
///
/// `[A-Za-z0-9_-]` is kept as is; every other byte becomes `%XX`. The mapping
/// is one-to-one, so distinct ids never share a file, and the result never
/// contains a path separator.
fn encode_key(user_id: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Inverse of [`encode_key`]. `None` for names this store did not write.
fn decode_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl ProfileStorage for FileProfileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load_profile(&self, user_id: &str) -> StorageResult<Option<String>> {
        let path = self.profile_path(user_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_profile(&self, user_id: &str, blob: &str) -> StorageResult<()> {
        let path = self.profile_path(user_id)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        // Atomic replace via rename.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(user_id, "saved profile to file");
        Ok(())
    }

    async fn list_profiles(&self) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(id) = path.file_stem().and_then(|stem| decode_key(&stem.to_string_lossy()))
            {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::timestamp_ms;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "mode0-{tag}-{}-{}",
            std::process::id(),
            timestamp_ms()
        ))
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryProfileStorage::new();
        assert!(storage.load_profile("1").await.unwrap().is_none());

        storage.save_profile("1", r#"{"user_id":"1"}"#).await.unwrap();
        storage.save_profile("1", r#"{"user_id":"1","message_count":2}"#).await.unwrap();

        let blob = storage.load_profile("1").await.unwrap().unwrap();
        assert!(blob.contains("message_count"));
        assert_eq!(storage.list_profiles().await.unwrap(), vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn test_file_storage() {
        let dir = temp_dir("file-storage");
        let storage = FileProfileStorage::open(&dir).await.unwrap();

        assert!(storage.load_profile("42").await.unwrap().is_none());
        storage.save_profile("42", r#"{"user_id":"42"}"#).await.unwrap();
        storage.save_profile("bob", r#"{"user_id":"bob"}"#).await.unwrap();

        assert_eq!(
            storage.load_profile("42").await.unwrap().as_deref(),
            Some(r#"{"user_id":"42"}"#)
        );
        assert_eq!(storage.list_profiles().await.unwrap(), vec!["42", "bob"]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_keys_stay_inside_dir() {
        let storage = FileProfileStorage::new("/tmp/mode0-profiles");
        let path = storage.profile_path("../../etc/passwd").unwrap();
        assert_eq!(path.parent(), Some(std::path::Path::new("/tmp/mode0-profiles")));
        assert!(matches!(
            storage.profile_path("  "),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_encoding_is_one_to_one() {
        assert_eq!(encode_key("42"), "42");
        assert_eq!(encode_key("a_b"), "a_b");
        assert_eq!(encode_key("a.b"), "a%2Eb");
        assert_ne!(encode_key("a.b"), encode_key("a_b"));
        assert_ne!(encode_key("a%2Eb"), encode_key("a.b"));

        for id in ["a.b", "a%2Eb", "../x", "zoë", "50% off"] {
            assert_eq!(decode_key(&encode_key(id)).as_deref(), Some(id));
        }
        assert!(decode_key("bad%zz").is_none());
        assert!(decode_key("short%4").is_none());
    }

    #[tokio::test]
    async fn test_file_storage_keeps_similar_ids_apart() {
        let dir = temp_dir("similar-ids");
        let storage = FileProfileStorage::open(&dir).await.unwrap();

        storage.save_profile("a.b", r#"{"user_id":"a.b"}"#).await.unwrap();
        storage.save_profile("a_b", r#"{"user_id":"a_b"}"#).await.unwrap();

        assert_eq!(
            storage.load_profile("a.b").await.unwrap().as_deref(),
            Some(r#"{"user_id":"a.b"}"#)
        );
        assert_eq!(
            storage.load_profile("a_b").await.unwrap().as_deref(),
            Some(r#"{"user_id":"a_b"}"#)
        );
        let mut ids = storage.list_profiles().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a.b", "a_b"]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
