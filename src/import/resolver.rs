//! Resolve import units into subtrees
//!
//! Each unit is resolved independently: the source is fetched, unpacked by
//! the matching collaborator, and turned into a folder according to the
//! unit's inclusion policy and image selection.

use crate::error::ImportError;
use crate::import::collab::ImportCollaborators;
use crate::import::unit::{ImageSelection, ImportUnit, InclusionPolicy, SourceKind};
use crate::tree::node::{Folder, Node};
use crate::tree::prepackaged::assemble;
use crate::tree::walker::DirectoryImporter;
use crate::tree::{normalize_name, Subtree};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Turns import units into subtrees using the injected collaborators
pub struct Resolver<'a> {
    collaborators: &'a ImportCollaborators,
    now: DateTime<Utc>,
}

impl<'a> Resolver<'a> {
    pub fn new(collaborators: &'a ImportCollaborators) -> Self {
        Self {
            collaborators,
            now: Utc::now(),
        }
    }

    /// Fix "now" for date clamping
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Resolve every unit in parallel; results keep the order of `units`
    pub fn resolve_all(&self, units: &[ImportUnit]) -> Vec<Result<Subtree, ImportError>> {
        units.par_iter().map(|unit| self.resolve(unit)).collect()
    }

    #[instrument(skip(self, unit), fields(unit = %unit.id, kind = %unit.kind))]
    pub fn resolve(&self, unit: &ImportUnit) -> Result<Subtree, ImportError> {
        let root = match unit.kind {
            SourceKind::RawImage => self.resolve_raw_image(unit)?,
            SourceKind::Archive => self.resolve_archive(unit)?,
            SourceKind::Prepackaged => self.resolve_prepackaged(unit)?,
        };
        info!(entries = root.descendant_count(), "Resolved import unit");
        Ok(Subtree::new(unit.destination.clone(), root))
    }

    fn resolve_raw_image(&self, unit: &ImportUnit) -> Result<Folder, ImportError> {
        let path = self.collaborators.fetcher.fetch(&unit.source)?;
        let bytes = std::fs::read(&path).map_err(|e| ImportError::SourceResolution {
            locator: unit.source.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        self.import_disk_image(&bytes, unit)
    }

    /// Apply the unit's inclusion policy to the volume stored in `image`
    fn import_disk_image(&self, image: &[u8], unit: &ImportUnit) -> Result<Folder, ImportError> {
        let mut volume = self.collaborators.volume_reader.read_volume(image)?;
        match &unit.policy {
            InclusionPolicy::WholeVolume => Ok(detach_children(volume, &HashSet::new())),
            InclusionPolicy::NamedFolder(name) => match volume.remove(name) {
                Some(Node::Folder(mut folder)) => {
                    folder.info.request_auto_arrange();
                    Ok(folder)
                }
                _ => Err(ImportError::ArchiveExtraction {
                    locator: unit.source.to_string(),
                    reason: format!("folder {:?} not found in volume", name),
                }),
            },
            InclusionPolicy::Denylist(names) => {
                Ok(detach_children(volume, &denied_names(names)))
            }
        }
    }

    fn resolve_archive(&self, unit: &ImportUnit) -> Result<Folder, ImportError> {
        let archive = self.collaborators.fetcher.fetch(&unit.source)?;
        let workdir = tempfile::Builder::new().prefix("infinite-hd-").tempdir()?;
        let index = self.collaborators.extractor.extract(&archive, workdir.path())?;
        debug!(entries = index.len(), "Archive extracted");
        let importer = DirectoryImporter::new(workdir.path(), &index).with_now(self.now);

        let mut root = Folder::new();
        // Most archives hold a single folder; it becomes the subtree root.
        let single_dir = single_top_level_dir(workdir.path())?;
        if let Some(dir) = &single_dir {
            importer.apply_folder_metadata(&mut root, dir);
            root.info.request_auto_arrange();
        }

        match &unit.images {
            ImageSelection::Single(name) => {
                let image = read_extracted(workdir.path(), name, unit)?;
                return self.import_disk_image(&image, unit);
            }
            ImageSelection::Multiple(names) => {
                let mut folder = Folder::new();
                for name in names {
                    let image = read_extracted(workdir.path(), name, unit)?;
                    folder.insert(name, self.import_disk_image(&image, unit)?);
                }
                return Ok(folder);
            }
            ImageSelection::None => {}
        }

        let mut dir = single_dir.unwrap_or_else(|| workdir.path().to_path_buf());
        let mut denied = HashSet::new();
        match &unit.policy {
            InclusionPolicy::WholeVolume => {}
            InclusionPolicy::NamedFolder(name) => {
                dir = dir.join(name);
                if !dir.is_dir() {
                    return Err(ImportError::ArchiveExtraction {
                        locator: unit.source.to_string(),
                        reason: format!("folder {:?} not found in archive", name),
                    });
                }
                importer.apply_folder_metadata(&mut root, &dir);
                root.info.request_auto_arrange();
            }
            InclusionPolicy::Denylist(names) => denied = denied_names(names),
        }

        let contents = importer.import_dir(&dir)?;
        for (name, child) in contents.into_children() {
            if !denied.contains(&name) {
                root.insert(&name, child);
            }
        }
        Ok(root)
    }

    fn resolve_prepackaged(&self, unit: &ImportUnit) -> Result<Folder, ImportError> {
        let bundle = self.collaborators.fetcher.fetch(&unit.source)?;
        let entries = self.collaborators.prepackaged_reader.read_entries(&bundle)?;
        debug!(entries = entries.len(), "Read prepackaged bundle");
        assemble(entries)
    }
}

fn denied_names(names: &[String]) -> HashSet<String> {
    names.iter().map(|name| normalize_name(name)).collect()
}

/// Move the children of `volume` into a fresh folder, minus `denied`
fn detach_children(volume: Folder, denied: &HashSet<String>) -> Folder {
    let mut folder = Folder::new();
    for (name, child) in volume.into_children() {
        if denied.contains(&name) {
            debug!(name = %name, "Excluded by denylist");
            continue;
        }
        folder.insert(&name, child);
    }
    folder
}

fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>, ImportError> {
    let entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(Some(only.clone())),
        _ => Ok(None),
    }
}

fn read_extracted(workdir: &Path, name: &str, unit: &ImportUnit) -> Result<Vec<u8>, ImportError> {
    std::fs::read(workdir.join(name)).map_err(|e| {
        let contents: Vec<String> = std::fs::read_dir(workdir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        ImportError::ArchiveExtraction {
            locator: unit.source.to_string(),
            reason: format!(
                "cannot read image {:?} ({}); archive contains: {}",
                name,
                e,
                contents.join(", ")
            ),
        }
    })
}
