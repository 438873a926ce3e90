//! Reconstruct images from a content manifest and a chunk store

use crate::error::StoreError;
use crate::manifest::{ChunkRef, ContentManifest};
use crate::store::ChunkStore;

/// Random-access reader over a chunked image
///
/// Zero chunks expand to zero bytes; every stored chunk must have exactly
/// the length its position in the manifest implies.
pub struct ImageReader<'a> {
    manifest: &'a ContentManifest,
    store: &'a dyn ChunkStore,
}

impl<'a> ImageReader<'a> {
    pub fn new(manifest: &'a ContentManifest, store: &'a dyn ChunkStore) -> Result<Self, StoreError> {
        manifest.validate()?;
        Ok(Self { manifest, store })
    }

    pub fn len(&self) -> u64 {
        self.manifest.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.total_size == 0
    }

    /// Bytes of chunk `index`
    pub fn read_chunk(&self, index: usize) -> Result<Vec<u8>, StoreError> {
        let expected = self.manifest.chunk_len(index);
        match self.manifest.chunks.get(index) {
            None => Err(StoreError::Manifest(format!(
                "chunk index {} out of range for {}",
                index, self.manifest.name
            ))),
            Some(ChunkRef::Zero) => Ok(vec![0u8; expected]),
            Some(ChunkRef::Stored(digest)) => {
                let data = self.store.read(digest)?;
                if data.len() != expected {
                    return Err(StoreError::SizeMismatch {
                        digest: digest.to_string(),
                        expected,
                        actual: data.len(),
                    });
                }
                Ok(data)
            }
        }
    }

    /// Fill `buf` from `offset`; returns the number of bytes read (0 at end)
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError> {
        let chunk_size = self.manifest.chunk_size;
        let mut read = 0usize;
        let mut position = offset;
        while read < buf.len() && position < self.manifest.total_size {
            let index = (position / chunk_size) as usize;
            let within = (position % chunk_size) as usize;
            let chunk = self.read_chunk(index)?;
            let available = &chunk[within..];
            let count = available.len().min(buf.len() - read);
            buf[read..read + count].copy_from_slice(&available[..count]);
            read += count;
            position += count as u64;
        }
        Ok(read)
    }

    /// The whole image
    pub fn reconstruct(&self) -> Result<Vec<u8>, StoreError> {
        let mut image = Vec::with_capacity(self.manifest.total_size as usize);
        for index in 0..self.manifest.chunks.len() {
            image.extend_from_slice(&self.read_chunk(index)?);
        }
        Ok(image)
    }

    /// Compare the stored image against `expected`, chunk by chunk
    pub fn verify(&self, expected: &[u8]) -> Result<bool, StoreError> {
        if expected.len() as u64 != self.manifest.total_size {
            return Ok(false);
        }
        let chunk_size = self.manifest.chunk_size as usize;
        for (index, slice) in expected.chunks(chunk_size).enumerate() {
            if self.read_chunk(index)? != slice {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
