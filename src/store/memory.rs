//! In-memory chunk store

use crate::chunk::ChunkDigest;
use crate::error::StoreError;
use crate::store::ChunkStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chunk store backed by a `HashMap`, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<ChunkDigest, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Number of writes that actually stored a new chunk
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl ChunkStore for MemoryChunkStore {
    fn exists(&self, digest: &ChunkDigest) -> Result<bool, StoreError> {
        Ok(self.chunks.read().contains_key(digest))
    }

    fn write(&self, digest: &ChunkDigest, data: &[u8]) -> Result<bool, StoreError> {
        let mut chunks = self.chunks.write();
        if chunks.contains_key(digest) {
            return Ok(false);
        }
        chunks.insert(*digest, data.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn read(&self, digest: &ChunkDigest) -> Result<Vec<u8>, StoreError> {
        self.chunks
            .read()
            .get(digest)
            .cloned()
            .ok_or_else(|| StoreError::ChunkNotFound(digest.to_string()))
    }
}
