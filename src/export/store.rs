//! Object storage for model artifacts
//!
//! [`ObjectStore`] is the `get` / `put` surface a remote bucket has to offer.
//! Credentials are resolved from the environment before any connection is
//! made so that "credentials absent" and "object not found" never blur.

use crate::error::{ResaleError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const ACCESS_KEY_ENV: &str = "RESALE_STORE_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "RESALE_STORE_SECRET_ACCESS_KEY";
pub const REGION_ENV: &str = "RESALE_STORE_REGION";
pub const ENDPOINT_ENV: &str = "RESALE_STORE_ENDPOINT";

pub const DEFAULT_REGION: &str = "ru-central1";
pub const DEFAULT_ENDPOINT: &str = "https://storage.yandexcloud.net";

/// Byte-level bucket access
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; a missing object is [`ResaleError::ArtifactNotFound`]
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Store an object, replacing any previous value
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()>;
}

fn not_found(bucket: &str, key: &str) -> ResaleError {
    ResaleError::ArtifactNotFound(format!("{}/{}", bucket, key))
}

/// Store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for InMemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}

/// Store backed by a directory; each bucket is a sub-directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object path; keys may not climb out of the bucket
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = |p: &Path| p.components().all(|c| matches!(c, Component::Normal(_)));
        if bucket.is_empty() || !is_plain(Path::new(bucket)) || key.is_empty() || !is_plain(relative) {
            return Err(ResaleError::InvalidInput(format!(
                "invalid object location '{}/{}'",
                bucket, key
            )));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

impl ObjectStore for DirectoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found(bucket, key)
            } else {
                ResaleError::IoError(e)
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(bucket, key, bytes = bytes.len(), "Stored object");
        Ok(())
    }
}

/// Access credentials for a remote store
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint: String,
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl StoreCredentials {
    /// Resolve from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve through `lookup`; empty values count as absent
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = [ACCESS_KEY_ENV, SECRET_KEY_ENV]
            .into_iter()
            .filter(|name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ResaleError::MissingCredentials(format!(
                "set {} to access the object store",
                missing.join(" and ")
            )));
        }

        Ok(Self {
            access_key_id: get(ACCESS_KEY_ENV).unwrap_or_default(),
            secret_access_key: get(SECRET_KEY_ENV).unwrap_or_default(),
            region: get(REGION_ENV).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: get(ENDPOINT_ENV).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        assert!(store.get("models", "a.rpm").unwrap_err().is_not_found());
        store.put("models", "a.rpm", b"abc").unwrap();
        assert_eq!(store.get("models", "a.rpm").unwrap(), b"abc");
        assert!(store.get("other", "a.rpm").unwrap_err().is_not_found());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        store.put("models", "v1/ridge.rpm", b"xyz").unwrap();
        assert_eq!(store.get("models", "v1/ridge.rpm").unwrap(), b"xyz");
        assert!(dir.path().join("models/v1/ridge.rpm").exists());
        assert!(store.get("models", "v2/ridge.rpm").unwrap_err().is_not_found());
        assert!(matches!(
            store.put("models", "../escape", b""),
            Err(ResaleError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_credentials_defaults() {
        let creds = StoreCredentials::from_lookup(env(&[
            (ACCESS_KEY_ENV, "id"),
            (SECRET_KEY_ENV, "secret"),
        ]))
        .unwrap();
        assert_eq!(creds.region, DEFAULT_REGION);
        assert_eq!(creds.endpoint, DEFAULT_ENDPOINT);
        let debug = format!("{:?}", creds);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn test_missing_credentials() {
        let err = StoreCredentials::from_lookup(env(&[(ACCESS_KEY_ENV, "id"), (SECRET_KEY_ENV, " ")]))
            .unwrap_err();
        assert!(matches!(err, ResaleError::MissingCredentials(_)));
        assert!(err.to_string().contains(SECRET_KEY_ENV));
        assert!(!err.to_string().contains(ACCESS_KEY_ENV));
    }
}
