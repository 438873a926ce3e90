//! Build folder trees from extracted directory structures

use crate::error::ImportError;
use crate::finder::EntryMetadata;
use crate::tree::name::normalize_relative_path;
use crate::tree::node::{File, Folder, Node};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory the host OS creates to disable indexing; never part of the volume
const IGNORED_DIRECTORIES: [&str; 1] = [".FBCLockFolder"];

/// Host-side metadata files with no legacy equivalent
const IGNORED_FILES: [&str; 1] = [".DS_Store"];

/// Extractor metadata keyed by archive-relative path
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    entries: HashMap<String, EntryMetadata>,
}

#[derive(Deserialize)]
struct ListingJson {
    #[serde(rename = "lsarContents", default)]
    contents: Vec<EntryMetadata>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index entries by their reported file name
    pub fn from_entries(entries: impl IntoIterator<Item = EntryMetadata>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            if let Some(name) = entry.file_name.clone() {
                index.insert(name, entry);
            }
        }
        index
    }

    /// Parse the extractor's JSON listing (`{"lsarContents": [...]}`)
    pub fn from_listing_json(json: &str) -> Result<Self, serde_json::Error> {
        let listing: ListingJson = serde_json::from_str(json)?;
        Ok(Self::from_entries(listing.contents))
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: EntryMetadata) {
        self.entries.insert(path.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find metadata for `rel_path`, retrying with the normalized form
    pub fn lookup(&self, rel_path: &str) -> Result<&EntryMetadata, ImportError> {
        if let Some(entry) = self.entries.get(rel_path) {
            return Ok(entry);
        }
        self.entries
            .get(&normalize_relative_path(rel_path))
            .ok_or_else(|| ImportError::MetadataLookup(rel_path.to_string()))
    }
}

/// Imports an extracted directory tree into a [`Folder`]
pub struct DirectoryImporter<'a> {
    extraction_root: PathBuf,
    index: &'a MetadataIndex,
    now: DateTime<Utc>,
}

impl<'a> DirectoryImporter<'a> {
    /// `extraction_root` is the directory the metadata paths are relative to
    pub fn new(extraction_root: impl Into<PathBuf>, index: &'a MetadataIndex) -> Self {
        Self {
            extraction_root: extraction_root.into(),
            index,
            now: Utc::now(),
        }
    }

    /// Fix "now" for date clamping
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Metadata for a path, falling back to defaults when the extractor has none
    pub fn entry_for(&self, path: &Path) -> EntryMetadata {
        let rel_path = self.relative_key(path);
        match self.index.lookup(&rel_path) {
            Ok(entry) => entry.clone(),
            Err(e) => {
                warn!(error = %e, "Using default Finder metadata");
                EntryMetadata::default()
            }
        }
    }

    /// Apply the folder metadata recorded for `path` to `folder`
    pub fn apply_folder_metadata(&self, folder: &mut Folder, path: &Path) {
        let entry = self.entry_for(path);
        folder.info = entry.folder_info();
        folder.dates = entry.timestamps(self.now);
    }

    /// Build a folder holding the contents of `dir`
    pub fn import_dir(&self, dir: &Path) -> Result<Folder, ImportError> {
        let mut root = Folder::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored_directory(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                ImportError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk {:?}: {}", dir, e),
                ))
            })?;
            let path = entry.path();
            let rel = path.strip_prefix(dir).map_err(|e| {
                ImportError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Entry {:?} outside of {:?}: {}", path, dir, e),
                ))
            })?;
            let components: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            let Some((name, parents)) = components.split_last() else {
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_file() && IGNORED_FILES.contains(&name.as_str()) {
                trace!(path = %path.display(), "Ignoring host metadata file");
                continue;
            }
            if !file_type.is_file() && !file_type.is_dir() {
                debug!(path = %path.display(), "Skipping special file");
                continue;
            }

            let Some(parent) = descend(&mut root, parents) else {
                warn!(path = %path.display(), "Parent is not a folder, skipping");
                continue;
            };

            if file_type.is_dir() {
                if parent.contains(name) {
                    continue;
                }
                let mut folder = Folder::new();
                self.apply_folder_metadata(&mut folder, path);
                parent.insert(name, folder);
            } else {
                let file = self.read_file(path)?;
                if parent.insert(name, file).is_some() {
                    warn!(path = %path.display(), "Name collides after normalization, replaced");
                }
            }
        }

        Ok(root)
    }

    fn read_file(&self, path: &Path) -> Result<File, ImportError> {
        let data = std::fs::read(path)?;
        let rsrc_path = path.join("..namedfork").join("rsrc");
        let resource_fork = if rsrc_path.exists() {
            std::fs::read(&rsrc_path)?
        } else {
            Vec::new()
        };
        let entry = self.entry_for(path);
        Ok(File {
            data,
            resource_fork,
            info: entry.file_info(),
            dates: entry.timestamps(self.now),
        })
    }

    fn relative_key(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.extraction_root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn is_ignored_directory(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && IGNORED_DIRECTORIES.contains(&entry.file_name().to_string_lossy().as_ref())
}

fn descend<'f>(root: &'f mut Folder, segments: &[String]) -> Option<&'f mut Folder> {
    let mut folder = root;
    for segment in segments {
        folder = match folder.get_mut(segment)? {
            Node::Folder(child) => child,
            Node::File(_) => return None,
        };
    }
    Some(folder)
}
