use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::IoError;

/// Key/value storage underneath a volume store.
///
/// Keys are `/`-separated relative paths such as `info` or
/// `1000_1000_2000/0-128_0-128_0-16`. Implementations must tolerate
/// concurrent writes to distinct keys.
pub trait StorageBackend: Send + Sync {
    /// Fetch the object at `key`, or `None` if it does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IoError>;

    /// Store `bytes` under `key`, replacing any previous object.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), IoError>;

    /// Human-readable location of the store (for logging and errors).
    fn identifier(&self) -> &str;
}

impl<T: StorageBackend + ?Sized> StorageBackend for &T {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IoError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), IoError> {
        (**self).put(key, bytes)
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// Backend rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    identifier: String,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Build a backend from a location string, accepting an optional `file://` prefix.
    pub fn from_location(location: &str) -> Self {
        Self::new(location.strip_prefix("file://").unwrap_or(location))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn fs_error(key: &str, err: std::io::Error) -> IoError {
        IoError::Filesystem {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

impl StorageBackend for LocalBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IoError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::fs_error(key, e)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), IoError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::fs_error(key, e))?;
        }

        // Readers never observe a half-written chunk.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes).map_err(|e| Self::fs_error(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::fs_error(key, e))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Backend holding every object in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .read()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IoError> {
        let objects = self
            .objects
            .read()
            .map_err(|e| IoError::Backend(e.to_string()))?;
        Ok(objects.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), IoError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| IoError::Backend(e.to_string()))?;
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn identifier(&self) -> &str {
        "memory://"
    }
}
