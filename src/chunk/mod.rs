//! Image chunking
//!
//! Splits an image into fixed-size chunks, stores every distinct non-zero
//! chunk once under its salted digest and describes the image with a
//! [`ContentManifest`].

pub mod digest;
pub mod reader;
pub mod sequential;

pub use digest::{salted_digest, ChunkDigest, CHUNK_SALT, DIGEST_LEN, MAX_SALT_LEN};
pub use reader::ImageReader;
pub use sequential::{Compression, SequentialChunker};

use crate::error::StoreError;
use crate::manifest::{ChunkRef, ContentManifest};
use crate::store::ChunkStore;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{info, instrument};

/// Default chunk size (256 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Counters for one chunking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub total_chunks: usize,
    /// All-zero chunks, recorded as `""` and never stored
    pub zero_chunks: usize,
    /// Chunks newly written to the store
    pub stored_chunks: usize,
    /// Non-zero chunks already present (earlier in this image or in the store)
    pub deduplicated_chunks: usize,
}

/// Splits images into content-addressed chunks
pub struct Chunker<'a> {
    store: &'a dyn ChunkStore,
    chunk_size: usize,
    salt: Vec<u8>,
}

impl<'a> Chunker<'a> {
    pub fn new(store: &'a dyn ChunkStore, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size,
            salt: CHUNK_SALT.to_vec(),
        }
    }

    pub fn with_salt(mut self, salt: &[u8]) -> Result<Self, StoreError> {
        if salt.len() > MAX_SALT_LEN {
            return Err(StoreError::SaltTooLong(salt.len()));
        }
        self.salt = salt.to_vec();
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chunk `image` into the store and build its manifest
    ///
    /// Digests are computed in parallel; each distinct digest is written at
    /// most once. The manifest lists chunks in offset order.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub fn chunk_image(
        &self,
        name: &str,
        image: &[u8],
    ) -> Result<(ContentManifest, ChunkStats), StoreError> {
        if self.chunk_size == 0 {
            return Err(StoreError::Manifest("chunk size must be positive".to_string()));
        }

        let chunks: Vec<ChunkRef> = image
            .par_chunks(self.chunk_size)
            .map(|slice| {
                if is_zero(slice) {
                    ChunkRef::Zero
                } else {
                    ChunkRef::Stored(salted_digest(&self.salt, slice))
                }
            })
            .collect();

        // First occurrence of each digest, so every chunk is written once
        let mut seen = HashSet::new();
        let unique: Vec<(usize, ChunkDigest)> = chunks
            .iter()
            .enumerate()
            .filter_map(|(index, chunk)| chunk.digest().map(|digest| (index, *digest)))
            .filter(|(_, digest)| seen.insert(*digest))
            .collect();

        let written: Vec<bool> = unique
            .par_iter()
            .map(|(index, digest)| {
                let start = index * self.chunk_size;
                let end = (start + self.chunk_size).min(image.len());
                self.store.write(digest, &image[start..end])
            })
            .collect::<Result<_, _>>()?;

        let zero_chunks = chunks.iter().filter(|c| **c == ChunkRef::Zero).count();
        let stored_chunks = written.iter().filter(|w| **w).count();
        let stats = ChunkStats {
            total_chunks: chunks.len(),
            zero_chunks,
            stored_chunks,
            deduplicated_chunks: chunks.len() - zero_chunks - stored_chunks,
        };

        let manifest = ContentManifest {
            name: name.to_string(),
            total_size: image.len() as u64,
            chunks,
            chunk_size: self.chunk_size as u64,
        };
        info!(
            name,
            total = stats.total_chunks,
            zero = stats.zero_chunks,
            stored = stats.stored_chunks,
            "Chunked image"
        );
        Ok((manifest, stats))
    }
}

fn is_zero(slice: &[u8]) -> bool {
    slice.iter().all(|&byte| byte == 0)
}
