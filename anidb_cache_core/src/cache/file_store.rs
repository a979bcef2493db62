//! Directory-tree store
//!
//! Each key maps to `<root>/<namespace...>/<leaf>.json.gz`. Blobs are gzip
//! compressed, writes go through a temporary file renamed into place, and a
//! file's mtime is the blob's last-modified time.

use crate::cache::store::{Store, StoredBlob};
use crate::cache::CacheKey;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::trace;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

/// Suffix of every blob file
const BLOB_EXTENSION: &str = "json.gz";

/// File-based store that persists blobs across restarts
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.root.clone();
        for component in key.components() {
            path.push(component);
        }
        path
    }

    fn blob_path(&self, key: &CacheKey) -> PathBuf {
        let mut path = self.dir_path(key);
        let leaf = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.set_file_name(format!("{leaf}.{BLOB_EXTENSION}"));
        path
    }
}

fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data).read_to_end(&mut output)?;
    Ok(output)
}

/// Writes `data` next to `path` and renames it into place
fn persist(path: &Path, data: &[u8]) -> io::Result<SystemTime> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("no parent directory to persist blob"))?;
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(data)?;
    let file = temp_file.persist(path).map_err(|e| e.error)?;
    file.metadata()?.modified()
}

fn is_not_found(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
}

async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::io(path, io::Error::other(e)))?
        .map_err(|e| StoreError::io(path, e))
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredBlob>, StoreError> {
        let path = self.blob_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let modified = fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| StoreError::io(&path, e))?;

        // Touched markers are empty files
        let data = if raw.is_empty() {
            raw
        } else {
            decompress(&raw).map_err(|e| StoreError::decode(&key.path(), e.to_string()))?
        };
        trace!("Read {} bytes from {}", data.len(), path.display());

        Ok(Some(StoredBlob {
            data,
            last_modified: DateTime::<Utc>::from(modified),
        }))
    }

    async fn set(&self, key: &CacheKey, data: Vec<u8>) -> Result<DateTime<Utc>, StoreError> {
        let path = self.blob_path(key);
        let compressed = compress(&data).map_err(|e| StoreError::io(&path, e))?;
        let target = path.clone();
        let modified = run_blocking(&path, move || persist(&target, &compressed)).await?;
        trace!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(DateTime::<Utc>::from(modified))
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        let path = self.blob_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn delete_all(&self, prefix: &CacheKey) -> Result<(), StoreError> {
        self.delete(prefix).await?;
        let dir = self.dir_path(prefix);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.blob_path(key);
        match fs::metadata(&path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => Ok(Some(DateTime::<Utc>::from(modified))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn touch_at(&self, key: &CacheKey, when: DateTime<Utc>) -> Result<(), StoreError> {
        let path = self.blob_path(key);
        let target = path.clone();
        let mtime = FileTime::from_system_time(SystemTime::from(when));
        run_blocking(&path, move || {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&target)?;
            filetime::set_file_mtime(&target, mtime)
        })
        .await
    }
}
