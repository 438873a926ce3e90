//! Sequential chunk files
//!
//! Older images are published as `<image>.<index><suffix>` files next to a
//! [`SequentialManifest`]. The manifest version is a sha256 digest of the
//! written chunk files, so changing the compression changes the version.

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::StoreError;
use crate::manifest::{chunk_count, SequentialManifest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_WINDOW_BITS: u32 = 22;

/// Compression applied to each chunk file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Compression {
    None,
    /// Served with `Content-Encoding: br`
    Brotli { quality: u32 },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Brotli { quality: 11 }
    }
}

impl Compression {
    /// File suffix for chunk files
    pub fn suffix(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Brotli { .. } => ".br",
        }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Brotli { quality } => {
                let mut writer = brotli::CompressorWriter::new(
                    Vec::new(),
                    BROTLI_BUFFER_SIZE,
                    *quality,
                    BROTLI_WINDOW_BITS,
                );
                writer.write_all(data)?;
                Ok(writer.into_inner())
            }
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Brotli { .. } => {
                let mut decoded = Vec::new();
                brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE).read_to_end(&mut decoded)?;
                Ok(decoded)
            }
        }
    }
}

/// Writes and reads sequential chunk files
#[derive(Debug, Clone, Copy)]
pub struct SequentialChunker {
    chunk_size: usize,
    compression: Compression,
}

impl Default for SequentialChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, Compression::default())
    }
}

impl SequentialChunker {
    pub fn new(chunk_size: usize, compression: Compression) -> Self {
        Self {
            chunk_size,
            compression,
        }
    }

    /// Path of chunk `index` of `image_name` in `dir`
    pub fn chunk_path(&self, dir: &Path, image_name: &str, index: u64) -> PathBuf {
        dir.join(format!("{}.{}{}", image_name, index, self.compression.suffix()))
    }

    /// Split `image` into chunk files in `out_dir`
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub fn write(
        &self,
        image_name: &str,
        image: &[u8],
        out_dir: &Path,
    ) -> Result<SequentialManifest, StoreError> {
        if self.chunk_size == 0 {
            return Err(StoreError::Manifest("chunk size must be positive".to_string()));
        }
        std::fs::create_dir_all(out_dir)?;

        let mut version = Sha256::new();
        let mut count = 0u64;
        for slice in image.chunks(self.chunk_size) {
            let encoded = self.compression.compress(slice)?;
            version.update(&encoded);
            let path = self.chunk_path(out_dir, image_name, count);
            let mut temp = NamedTempFile::new_in(out_dir)?;
            temp.write_all(&encoded)?;
            temp.persist(&path).map_err(|e| StoreError::IoError(e.error))?;
            debug!(path = %path.display(), bytes = encoded.len(), "Wrote chunk file");
            count += 1;
        }

        let manifest = SequentialManifest {
            total_size: image.len() as u64,
            chunk_count: count,
            chunk_size: self.chunk_size as u64,
            version: hex::encode(version.finalize()),
        };
        info!(image = image_name, chunks = count, "Wrote sequential chunks");
        Ok(manifest)
    }

    /// Reassemble an image from its chunk files
    pub fn read(
        &self,
        manifest: &SequentialManifest,
        image_name: &str,
        dir: &Path,
    ) -> Result<Vec<u8>, StoreError> {
        manifest.validate()?;
        let mut image = Vec::with_capacity(manifest.total_size as usize);
        for index in 0..chunk_count(manifest.total_size, manifest.chunk_size) {
            let path = self.chunk_path(dir, image_name, index);
            let encoded = std::fs::read(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    StoreError::ChunkNotFound(path.display().to_string())
                }
                _ => StoreError::IoError(e),
            })?;
            image.extend_from_slice(&self.compression.decompress(&encoded)?);
        }
        if image.len() as u64 != manifest.total_size {
            return Err(StoreError::SizeMismatch {
                digest: manifest.version.clone(),
                expected: manifest.total_size as usize,
                actual: image.len(),
            });
        }
        Ok(image)
    }
}
