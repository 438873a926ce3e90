//! Chunk Store
//!
//! Content-addressed storage for image chunks. The store is append-only
//! across runs: a chunk, once written, is never rewritten or removed except
//! by an explicit full clear.

pub mod fs;
pub mod memory;

pub use fs::FsChunkStore;
pub use memory::MemoryChunkStore;

use crate::chunk::ChunkDigest;
use crate::error::StoreError;

/// Chunk Store interface
///
/// Writes are idempotent: storing the same digest twice, even concurrently,
/// leaves exactly one copy of identical bytes.
pub trait ChunkStore: Send + Sync {
    fn exists(&self, digest: &ChunkDigest) -> Result<bool, StoreError>;

    /// Store `data` under `digest`; returns `false` when it was already present
    fn write(&self, digest: &ChunkDigest, data: &[u8]) -> Result<bool, StoreError>;

    /// Read a chunk, failing with [`StoreError::ChunkNotFound`] when absent
    fn read(&self, digest: &ChunkDigest) -> Result<Vec<u8>, StoreError>;
}
