//! Error types for the Infinite HD build pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Finder metadata codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Errors raised while turning an import unit into a subtree
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to resolve source {locator}: {reason}")]
    SourceResolution { locator: String, reason: String },

    #[error("Archive extraction failed for {locator}: {reason}")]
    ArchiveExtraction { locator: String, reason: String },

    #[error("No metadata entry for {0}")]
    MetadataLookup(String),

    #[error("Unsupported source format: {0}")]
    Format(String),

    #[error("Invalid import configuration {path:?}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Import I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ImportError {
    /// Configuration bugs cannot be fixed by skipping a unit; they abort the run.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, ImportError::Format(_) | ImportError::InvalidConfig { .. })
    }
}

/// Chunk store and manifest errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("Invalid chunk digest: {0}")]
    InvalidDigest(String),

    #[error("Chunk salt is {0} bytes, at most 16 are allowed")]
    SaltTooLong(usize),

    #[error("Chunk size mismatch for {digest}: expected {expected}, got {actual}")]
    SizeMismatch {
        digest: String,
        expected: usize,
        actual: usize,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Store I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Top-level build errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Required import unit {unit} failed: {source}")]
    RequiredUnitFailed {
        unit: String,
        #[source]
        source: ImportError,
    },

    #[error("Merge conflict at {0}")]
    MergeConflict(String),

    #[error("Serialization failed for volume {volume}: {reason}")]
    Serialization { volume: String, reason: String },

    #[error("Failed to read volume {volume}: {reason}")]
    VolumeRead { volume: String, reason: String },
}

impl From<config::ConfigError> for BuildError {
    fn from(err: config::ConfigError) -> Self {
        BuildError::ConfigError(err.to_string())
    }
}
