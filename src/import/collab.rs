//! External collaborators used while resolving import units
//!
//! Network fetch, archive extraction, reading legacy volumes and unpacking
//! prepackaged bundles all happen outside the core. Each is a trait so the
//! pipeline can be driven by native tools in production and by fakes in tests.

use crate::error::ImportError;
use crate::import::unit::SourceLocator;
use crate::tree::node::Folder;
use crate::tree::prepackaged::PrepackagedEntry;
use crate::tree::walker::MetadataIndex;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Makes a source available as a local file
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &SourceLocator) -> Result<PathBuf, ImportError>;
}

/// Unpacks an archive into `dest` and reports per-path Finder metadata
///
/// Failures are reported as [`ImportError::ArchiveExtraction`].
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<MetadataIndex, ImportError>;
}

/// Reads the root folder of a legacy volume image
pub trait VolumeReader: Send + Sync {
    fn read_volume(&self, image: &[u8]) -> Result<Folder, ImportError>;
}

/// Lists the entries of a prepackaged bundle
pub trait PrepackagedReader: Send + Sync {
    fn read_entries(&self, bundle: &Path) -> Result<Vec<PrepackagedEntry>, ImportError>;
}

/// Collaborators needed to resolve every source kind
pub struct ImportCollaborators {
    pub fetcher: Box<dyn SourceFetcher>,
    pub extractor: Box<dyn ArchiveExtractor>,
    pub volume_reader: Box<dyn VolumeReader>,
    pub prepackaged_reader: Box<dyn PrepackagedReader>,
}

/// Fetcher for sources already on disk
///
/// Paths resolve against the library directory. URLs resolve to a cache file
/// named after the hex sha256 of the URL; populating the cache is left to
/// whoever downloads the sources.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    library_dir: PathBuf,
    cache_dir: PathBuf,
}

impl LocalFetcher {
    pub fn new(library_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache location for `url`
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(hex::encode(Sha256::digest(url.as_bytes())))
    }
}

impl SourceFetcher for LocalFetcher {
    fn fetch(&self, source: &SourceLocator) -> Result<PathBuf, ImportError> {
        let path = match source {
            SourceLocator::Url(url) => self.cache_path(url),
            SourceLocator::Path(path) if path.is_absolute() => path.clone(),
            SourceLocator::Path(path) => self.library_dir.join(path),
        };
        if !path.exists() {
            return Err(ImportError::SourceResolution {
                locator: source.to_string(),
                reason: format!("{} does not exist", path.display()),
            });
        }
        debug!(source = %source, path = %path.display(), "Resolved source locally");
        Ok(path)
    }
}

/// Reads `.zip` bundles
///
/// Entries are reported in archive order. Directory entries keep their
/// trailing `/` so explicit folders can be told apart from implied ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPrepackagedReader;

impl PrepackagedReader for ZipPrepackagedReader {
    fn read_entries(&self, bundle: &Path) -> Result<Vec<PrepackagedEntry>, ImportError> {
        let bundle_error = |reason: String| ImportError::ArchiveExtraction {
            locator: bundle.display().to_string(),
            reason,
        };

        let mut archive =
            ZipArchive::new(File::open(bundle)?).map_err(|e| bundle_error(e.to_string()))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| bundle_error(e.to_string()))?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                entries.push(PrepackagedEntry::directory(name));
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| bundle_error(format!("{}: {}", name, e)))?;
            entries.push(PrepackagedEntry::file(name, data));
        }
        Ok(entries)
    }
}

/// Write `entries` as a `.zip` bundle readable by [`ZipPrepackagedReader`]
pub fn write_zip_bundle(bundle: &Path, entries: &[PrepackagedEntry]) -> Result<(), ImportError> {
    let bundle_error = |reason: String| ImportError::ArchiveExtraction {
        locator: bundle.display().to_string(),
        reason,
    };

    let mut zip = ZipWriter::new(File::create(bundle)?);
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        if entry.is_directory() {
            zip.add_directory(entry.path.as_str(), options)
                .map_err(|e| bundle_error(e.to_string()))?;
        } else {
            zip.start_file(entry.path.as_str(), options)
                .map_err(|e| bundle_error(e.to_string()))?;
            zip.write_all(&entry.data)?;
        }
    }
    zip.finish().map_err(|e| bundle_error(e.to_string()))?;
    Ok(())
}
