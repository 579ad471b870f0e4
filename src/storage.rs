//! Disk layout for transfer payloads: one directory per transfer id under
//! the upload root. The negotiation core only needs two things from here:
//! persist bytes under a transfer id, and produce a file listing with sizes
//! for a transfer id.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::warn;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{DropError, Result};
use crate::models::FileItem;

const SPOOL_PREFIX: &str = ".spool-";

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

/// An upload in flight, written to a spool file under the upload root before
/// its destination is known. Multipart fields arrive in caller order, so the
/// bytes can land before the transfer id does; spooling keeps the payload off
/// the heap either way.
pub struct Spool {
    path: PathBuf,
    file: tokio::fs::File,
    size: u64,
}

impl Spool {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn transfer_dir(&self, transfer_id: &str) -> Result<PathBuf> {
        // the id names a single directory component, nothing more
        if transfer_id.is_empty() || !is_clean_relative(Path::new(transfer_id)) {
            return Err(DropError::PathOutsideTransfer);
        }
        Ok(self.root.join(transfer_id))
    }

    /// Opens a fresh spool file for an incoming upload.
    pub async fn spool(&self) -> Result<Spool> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{SPOOL_PREFIX}{}", Uuid::new_v4()));
        let file = tokio::fs::File::create(&path).await?;
        Ok(Spool {
            path,
            file,
            size: 0,
        })
    }

    /// Moves a finished spool to `transfer_id/relative_path`, creating any
    /// nested directories the relative path names, and returns the final path
    /// with the byte count. Paths that escape the transfer directory are
    /// rejected; a spool that cannot be placed is removed.
    pub async fn commit(
        &self,
        mut spool: Spool,
        transfer_id: &str,
        relative_path: &str,
    ) -> Result<(PathBuf, u64)> {
        match self.place(&mut spool, transfer_id, relative_path).await {
            Ok(path) => Ok((path, spool.size)),
            Err(e) => {
                let _ = tokio::fs::remove_file(&spool.path).await;
                Err(e)
            }
        }
    }

    async fn place(
        &self,
        spool: &mut Spool,
        transfer_id: &str,
        relative_path: &str,
    ) -> Result<PathBuf> {
        let dest = self.resolve(transfer_id, relative_path)?;
        spool.file.flush().await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&spool.path, &dest).await?;
        Ok(dest)
    }

    /// Removes a spool whose upload will not complete.
    pub async fn discard(&self, spool: Spool) {
        let _ = tokio::fs::remove_file(&spool.path).await;
    }

    /// Walks the transfer directory and lists every file with its size and
    /// path relative to the transfer root. Errors with
    /// `TransferFilesNotFound` when nothing has been uploaded under this id.
    pub async fn scan(&self, transfer_id: &str) -> Result<Vec<FileItem>> {
        let dir = self.transfer_dir(transfer_id)?;
        if !dir.is_dir() {
            return Err(DropError::TransferFilesNotFound);
        }

        let mut files = Vec::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() {
                    let relative = path
                        .strip_prefix(&dir)
                        .map_err(|_| DropError::PathOutsideTransfer)?;
                    files.push(FileItem {
                        name: entry.file_name().to_string_lossy().to_string(),
                        size: meta.len(),
                        file_type: Some(guess_mime(&path)),
                        path: Some(relative.to_string_lossy().to_string()),
                    });
                }
            }
        }
        Ok(files)
    }

    /// Resolves a download path inside the transfer directory, rejecting
    /// traversal, and returns it with the file size.
    pub async fn locate(&self, transfer_id: &str, relative_path: &str) -> Result<(PathBuf, u64)> {
        let path = self.resolve(transfer_id, relative_path)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| DropError::TransferFilesNotFound)?;
        if !meta.is_file() {
            return Err(DropError::TransferFilesNotFound);
        }
        Ok((path, meta.len()))
    }

    /// Removes the transfer directory and everything in it; idempotent.
    pub async fn delete(&self, transfer_id: &str) -> Result<()> {
        let dir = self.transfer_dir(transfer_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes transfer directories whose mtime is older than `max_age`.
    /// Returns how many were removed.
    pub async fn sweep_older_than(&self, max_age: Duration) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }
            if meta.is_dir() {
                match tokio::fs::remove_dir_all(entry.path()).await {
                    Ok(()) => {
                        log::info!("deleted stale transfer {:?}", entry.file_name());
                        removed += 1;
                    }
                    Err(e) => warn!("could not delete {:?}: {e}", entry.path()),
                }
            } else if entry.file_name().to_string_lossy().starts_with(SPOOL_PREFIX) {
                // spool left behind by an interrupted upload
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
        Ok(removed)
    }

    fn resolve(&self, transfer_id: &str, relative_path: &str) -> Result<PathBuf> {
        let dir = self.transfer_dir(transfer_id)?;
        let relative = Path::new(relative_path);
        if relative_path.is_empty() || !is_clean_relative(relative) {
            return Err(DropError::PathOutsideTransfer);
        }
        Ok(dir.join(relative))
    }
}

/// True when the path is purely relative: no root, no `..`, no prefix.
fn is_clean_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
