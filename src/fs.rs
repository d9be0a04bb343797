//! Filesystem capability used by retention.
//!
//! The router owns its active file directly; this trait only covers what
//! retention needs — enumerating a directory, opening prior logfiles to
//! read their headers back, and deleting the ones that fall out of the
//! retention window. [`OsFileSystem`] is the production implementation;
//! [`MemoryFileSystem`] backs tests without touching disk.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// Byte stream handed out by [`FileSystem::open_for_reading`].
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Minimal filesystem surface for retention.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Lists the files directly inside `dir`.
    async fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Opens a file for sequential reading.
    async fn open_for_reading(&self, path: &Path) -> Result<ByteStream>;

    /// Deletes a file.
    async fn delete(&self, path: &Path) -> Result<()>;
}

/// The real filesystem via `tokio::fs`.
pub struct OsFileSystem;

#[async_trait]
impl FileSystem for OsFileSystem {
    async fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }

    async fn open_for_reading(&self, path: &Path) -> Result<ByteStream> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

/// An in-memory filesystem for tests.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), bytes.into());
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    async fn open_for_reading(&self, path: &Path) -> Result<ByteStream> {
        let files = self.files.lock().unwrap();
        let bytes = files.get(path).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            ))
        })?;
        Ok(Box::new(Cursor::new(bytes.clone())))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        files.remove(path).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            ))
        })?;
        Ok(())
    }
}
