//! Image manifests
//!
//! Two JSON schemas describe a chunked image:
//!
//! - content manifests (`name`, `totalSize`, `chunks`, `chunkSize`) list one
//!   digest per chunk, with `""` standing for an all-zero chunk;
//! - sequential manifests (`totalSize`, `chunkCount`, `chunkSize`,
//!   `version`) describe images split into numbered chunk files.

use crate::chunk::ChunkDigest;
use crate::error::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// One entry of a content manifest's `chunks` list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkRef {
    /// All-zero chunk; never stored
    Zero,
    Stored(ChunkDigest),
}

impl ChunkRef {
    pub fn digest(&self) -> Option<&ChunkDigest> {
        match self {
            ChunkRef::Zero => None,
            ChunkRef::Stored(digest) => Some(digest),
        }
    }
}

impl Serialize for ChunkRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChunkRef::Zero => serializer.serialize_str(""),
            ChunkRef::Stored(digest) => digest.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ChunkRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(ChunkRef::Zero);
        }
        s.parse()
            .map(ChunkRef::Stored)
            .map_err(serde::de::Error::custom)
    }
}

/// Number of chunks needed for `total_size` bytes
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(chunk_size)
}

/// Content-addressed chunk list for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentManifest {
    pub name: String,
    pub total_size: u64,
    pub chunks: Vec<ChunkRef>,
    pub chunk_size: u64,
}

impl ContentManifest {
    /// Check the chunk count against `totalSize` and `chunkSize`
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.chunk_size == 0 {
            return Err(StoreError::Manifest(format!(
                "{}: chunkSize must be positive",
                self.name
            )));
        }
        let expected = chunk_count(self.total_size, self.chunk_size);
        if self.chunks.len() as u64 != expected {
            return Err(StoreError::Manifest(format!(
                "{}: expected {} chunks for {} bytes, found {}",
                self.name,
                expected,
                self.total_size,
                self.chunks.len()
            )));
        }
        Ok(())
    }

    /// Length of chunk `index`; only the last chunk may be short
    pub fn chunk_len(&self, index: usize) -> usize {
        let start = index as u64 * self.chunk_size;
        self.total_size.saturating_sub(start).min(self.chunk_size) as usize
    }

    /// Distinct stored digests, in first-use order
    pub fn stored_digests(&self) -> Vec<ChunkDigest> {
        let mut seen = std::collections::HashSet::new();
        self.chunks
            .iter()
            .filter_map(ChunkRef::digest)
            .filter(|digest| seen.insert(**digest))
            .copied()
            .collect()
    }
}

/// Manifest of an image split into numbered chunk files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialManifest {
    pub total_size: u64,
    pub chunk_count: u64,
    pub chunk_size: u64,
    /// Hex digest over every written chunk file, in order
    pub version: String,
}

impl SequentialManifest {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.chunk_size == 0 {
            return Err(StoreError::Manifest("chunkSize must be positive".to_string()));
        }
        let expected = chunk_count(self.total_size, self.chunk_size);
        if self.chunk_count != expected {
            return Err(StoreError::Manifest(format!(
                "expected {} chunks for {} bytes, found {}",
                expected, self.total_size, self.chunk_count
            )));
        }
        Ok(())
    }
}

/// Either manifest schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageManifest {
    Content(ContentManifest),
    Sequential(SequentialManifest),
}

impl ImageManifest {
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            ImageManifest::Content(manifest) => manifest.validate(),
            ImageManifest::Sequential(manifest) => manifest.validate(),
        }
    }

    pub fn total_size(&self) -> u64 {
        match self {
            ImageManifest::Content(manifest) => manifest.total_size,
            ImageManifest::Sequential(manifest) => manifest.total_size,
        }
    }
}

/// Atomically write a manifest as 4-space indented JSON
///
/// Call only once every chunk the manifest references is stored.
pub fn write_manifest<T: Serialize>(path: &Path, manifest: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    manifest
        .serialize(&mut serializer)
        .map_err(|e| StoreError::Manifest(format!("Failed to serialize manifest: {}", e)))?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&buffer)?;
    temp.persist(path).map_err(|e| {
        StoreError::IoError(std::io::Error::new(
            e.error.kind(),
            format!("Failed to persist manifest {:?}: {}", path, e.error),
        ))
    })?;
    Ok(())
}

/// Read and validate a manifest of either schema
pub fn read_manifest(path: &Path) -> Result<ImageManifest, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let manifest: ImageManifest = serde_json::from_str(&contents)
        .map_err(|e| StoreError::Manifest(format!("Failed to parse {:?}: {}", path, e)))?;
    manifest.validate()?;
    Ok(manifest)
}
