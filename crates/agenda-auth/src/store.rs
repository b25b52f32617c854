//! Key-value persistence backends.
//!
//! The session only needs an opaque asynchronous string store with
//! `get`/`set`/`multi_remove`. Two backends are provided:
//!
//! - [`MemoryStore`]: process-local, for tests and throwaway sessions
//! - [`FileStore`]: a JSON object on disk, rewritten atomically

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::BoxFuture;
use crate::error::{AuthError, AuthResult};

/// Opaque asynchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`, or `None` when absent.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AuthResult<Option<String>>>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, AuthResult<()>>;

    /// Removes every key in `keys`. Missing keys are not an error.
    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, AuthResult<()>>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AuthResult<Option<String>>> {
        let value = self.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, AuthResult<()>> {
        self.lock().insert(key.to_string(), value.to_string());
        Box::pin(async { Ok(()) })
    }

    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, AuthResult<()>> {
        let mut entries = self.lock();
        for key in keys {
            entries.remove(*key);
        }
        drop(entries);
        Box::pin(async { Ok(()) })
    }
}

/// File-backed store holding all entries in a single JSON object.
///
/// Every write goes to a temporary file that is then renamed over the
/// original, and the file is restricted to the owner on Unix.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by the file at `path`. The file is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> AuthResult<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no session file at {:?}", self.path);
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(AuthError::storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                ))
                .with_source(e));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AuthError::storage(format!("failed to parse {}: {}", self.path.display(), e))
                .with_source(e)
        })
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AuthError::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| AuthError::storage(format!("failed to serialize session: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await.map_err(|e| {
            AuthError::storage(format!("failed to write {}: {}", temp_path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await
            {
                warn!("failed to restrict permissions on {:?}: {}", temp_path, e);
            }
        }

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            AuthError::storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!("saved session to {:?}", self.path);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AuthResult<Option<String>>> {
        Box::pin(async move {
            let mut entries = self.read_entries().await?;
            Ok(entries.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut entries = self.read_entries().await?;
            entries.insert(key.to_string(), value.to_string());
            self.write_entries(&entries).await
        })
    }

    fn multi_remove<'a>(&'a self, keys: &'a [&'a str]) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut entries = self.read_entries().await?;
            let before = entries.len();
            for key in keys {
                entries.remove(*key);
            }
            if entries.len() == before {
                return Ok(());
            }
            self.write_entries(&entries).await
        })
    }
}
