//! The storage server's local filesystem adapter (spec §4.E): maps a
//! [`Path`] to a file under a root directory and implements
//! `size`/`read`/`write`/`create`/`delete` plus post-delete ancestor
//! pruning.
//!
//! Every public operation is serialized by a single instance-level lock
//! (spec §5) — two concurrent calls on the same [`LocalStorage`] never
//! interleave, though calls against different storage servers are
//! entirely independent.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{DfsError, Result};
use crate::path::Path;

/// A local, root-rooted file store.
pub struct LocalStorage {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root, lock: Mutex::new(()) }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Fails with [`DfsError::NotFound`] if `root` does not exist or is not
    /// a directory — checked once at startup (spec §4.E).
    pub async fn verify_root(&self) -> Result<()> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|_| DfsError::NotFound(format!("{} does not exist", self.root.display())))?;
        if !metadata.is_dir() {
            return Err(DfsError::NotFound(format!("{} is not a directory", self.root.display())));
        }
        Ok(())
    }

    /// The byte length of the file at `path`. Fails *not-found* if missing
    /// or a directory.
    pub async fn size(&self, path: &Path) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let metadata = self.file_metadata(path).await?;
        Ok(metadata.len())
    }

    /// Reads exactly `length` bytes starting at `offset`. Fails
    /// *out-of-bounds* for a negative offset/length, an offset beyond
    /// `i32::MAX`, or a range extending past the end of the file.
    pub async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>> {
        let _guard = self.lock.lock().await;
        let metadata = self.file_metadata(path).await?;
        validate_range(offset, length, metadata.len())?;

        let mut file = fs::File::open(path.to_file(&self.root)).await?;
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
        let mut buf = vec![0u8; length as usize];
        // `read_exact` loops internally until the buffer is filled — the
        // explicit fix for a single short low-level read (spec §9).
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Writes `data` starting at `offset`, extending the file if needed.
    /// The file is opened without truncation, so bytes outside
    /// `[offset, offset+data.len())` are preserved (spec §9).
    pub async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().await;
        if offset < 0 {
            return Err(DfsError::OutOfBounds(format!("negative offset {offset}")));
        }
        if path.is_root() {
            return Err(DfsError::NotFound("root is not a file".into()));
        }
        let file_path = path.to_file(&self.root);
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|_| DfsError::NotFound(format!("{path} does not exist")))?;
        if metadata.is_dir() {
            return Err(DfsError::NotFound(format!("{path} is a directory")));
        }

        let mut file = fs::OpenOptions::new().write(true).open(&file_path).await?;
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
        file.write_all(data).await?;
        Ok(())
    }

    /// Creates an empty file at `path`, along with any missing ancestor
    /// directories. Returns `false` for the root or an already-existing
    /// path.
    pub async fn create(&self, path: &Path) -> Result<bool> {
        let _guard = self.lock.lock().await;
        if path.is_root() {
            tracing::debug!(%path, "refusing to create the root");
            return Ok(false);
        }
        let file_path = path.to_file(&self.root);
        if fs::metadata(&file_path).await.is_ok() {
            tracing::debug!(%path, "create: path already exists");
            return Ok(false);
        }
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(&file_path).await {
            Ok(_) => {
                tracing::info!(%path, "created file");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(%path, error = %e, "create failed");
                Ok(false)
            }
        }
    }

    /// Recursively removes the file or directory subtree at `path`, then
    /// prunes now-empty ancestor directories up to but not including the
    /// root. Returns `false` for the root or a missing path.
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        let _guard = self.lock.lock().await;
        if path.is_root() {
            tracing::debug!(%path, "refusing to delete the root");
            return Ok(false);
        }
        let file_path = path.to_file(&self.root);
        let metadata = match fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(_) => {
                tracing::debug!(%path, "delete: path does not exist");
                return Ok(false);
            }
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&file_path).await?;
        } else {
            fs::remove_file(&file_path).await?;
        }
        tracing::info!(%path, "deleted");
        self.prune_ancestors(path).await?;
        Ok(true)
    }

    /// Walks upward from `path`'s parent, removing each directory that is
    /// empty, stopping at the first non-empty directory or at the root
    /// (spec §4.E).
    async fn prune_ancestors(&self, path: &Path) -> Result<()> {
        let mut current = match path.parent() {
            Ok(p) => p,
            Err(_) => return Ok(()),
        };
        loop {
            if current.is_root() {
                return Ok(());
            }
            let dir_path = current.to_file(&self.root);
            let mut entries = match fs::read_dir(&dir_path).await {
                Ok(e) => e,
                Err(_) => return Ok(()),
            };
            if entries.next_entry().await?.is_some() {
                return Ok(());
            }
            fs::remove_dir(&dir_path).await?;
            tracing::debug!(pruned = %current, "pruned empty ancestor directory");
            current = current.parent()?;
        }
    }

    async fn file_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
        let file_path = path.to_file(&self.root);
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|_| DfsError::NotFound(format!("{path} does not exist")))?;
        if metadata.is_dir() {
            return Err(DfsError::NotFound(format!("{path} is a directory")));
        }
        Ok(metadata)
    }
}

fn validate_range(offset: i64, length: i64, file_len: u64) -> Result<()> {
    if offset < 0 {
        return Err(DfsError::OutOfBounds(format!("negative offset {offset}")));
    }
    if offset > i32::MAX as i64 {
        return Err(DfsError::OutOfBounds(format!("offset {offset} exceeds i32::MAX")));
    }
    if length < 0 {
        return Err(DfsError::OutOfBounds(format!("negative length {length}")));
    }
    let end = offset
        .checked_add(length)
        .ok_or_else(|| DfsError::OutOfBounds("offset + length overflows".into()))?;
    if end as u64 > file_len {
        return Err(DfsError::OutOfBounds(format!(
            "range [{offset}, {end}) exceeds file length {file_len}"
        )));
    }
    Ok(())
}
