//! Filesystem chunk store
//!
//! Chunks live in one flat directory as `{root}/{digest}.chunk`, the layout
//! remote readers fetch from directly.

use crate::chunk::ChunkDigest;
use crate::error::StoreError;
use crate::store::ChunkStore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const CHUNK_EXTENSION: &str = "chunk";

/// Content-addressed chunk storage on the local filesystem
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create chunk directory at {:?}: {}", root, e),
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the chunk file for `digest`
    pub fn chunk_path(&self, digest: &ChunkDigest) -> PathBuf {
        self.root.join(format!("{}.{}", digest, CHUNK_EXTENSION))
    }

    /// Digests of every stored chunk, sorted
    pub fn digests(&self) -> Result<Vec<ChunkDigest>, StoreError> {
        let mut digests = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CHUNK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if let Ok(digest) = stem.parse() {
                    digests.push(digest);
                }
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Remove every chunk; used before a full rebuild
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!(removed, root = %self.root.display(), "Cleared chunk store");
        Ok(removed)
    }
}

impl ChunkStore for FsChunkStore {
    fn exists(&self, digest: &ChunkDigest) -> Result<bool, StoreError> {
        Ok(self.chunk_path(digest).exists())
    }

    fn write(&self, digest: &ChunkDigest, data: &[u8]) -> Result<bool, StoreError> {
        let chunk_path = self.chunk_path(digest);
        if chunk_path.exists() {
            return Ok(false);
        }

        // Unique temp file per writer; a racing writer of the same digest
        // persists identical bytes.
        let mut temp = NamedTempFile::new_in(&self.root).map_err(|e| {
            StoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create temp file in {:?}: {}", self.root, e),
            ))
        })?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(&chunk_path).map_err(|e| {
            StoreError::IoError(std::io::Error::new(
                e.error.kind(),
                format!("Failed to persist chunk {:?}: {}", chunk_path, e.error),
            ))
        })?;

        debug!(digest = %digest, bytes = data.len(), "Stored chunk");
        Ok(true)
    }

    fn read(&self, digest: &ChunkDigest) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.chunk_path(digest)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::ChunkNotFound(digest.to_string()))
            }
            Err(e) => Err(StoreError::IoError(e)),
        }
    }
}
