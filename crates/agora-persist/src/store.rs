//! Artifact store trait and backends

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Whole-file artifact storage. `put` replaces the previous contents.
#[async_trait]
pub trait ArtifactStore: Send + Sync + Debug {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Replace the artifact `name` with `bytes`
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Read an artifact
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// List artifact names, sorted
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}

fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Directory-backed store. Writes go to a temp file that is renamed over the
/// target, so readers never observe a half-written table.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an artifact is written to
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl ArtifactStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        check_name(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;

        let target = self.path_of(name);
        let temp = self.root.join(format!(".{}.tmp", name));
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| io_error(&temp, e))?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| io_error(&target, e))?;

        tracing::trace!(artifact = name, bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        check_name(name)?;
        let path = self.path_of(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.root, e))? {
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory store (for testing)
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: tokio::sync::RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        check_name(name)?;
        self.data.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.read().await.keys().cloned().collect())
    }
}
