//! Build pipeline
//!
//! Resolves import units, merges them into one destination tree per volume
//! variant, serializes each tree through the external filesystem serializer
//! and publishes the resulting image into the chunk store.

use crate::chunk::{ChunkStats, Chunker};
use crate::error::{BuildError, ImportError, StoreError};
use crate::import::{Generation, GenerationSet, ImportCollaborators, ImportUnit, Resolver};
use crate::manifest::{write_manifest, ContentManifest};
use crate::store::ChunkStore;
use crate::tree::hasher::fingerprint_folder;
use crate::tree::{merge, ConflictPolicy, Folder, MergeReport, Subtree};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

const MIB: u64 = 1024 * 1024;

/// One output volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeVariant {
    pub name: String,
    /// Units sharing at least one generation tag with this volume are merged into it
    pub generations: GenerationSet,
    /// Earlier variant whose merged tree this one starts from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    pub size_bytes: u64,
    #[serde(default = "default_block_alignment")]
    pub block_alignment: u32,
    #[serde(default)]
    pub bootable: bool,
}

fn default_block_alignment() -> u32 {
    512
}

impl VolumeVariant {
    pub fn accepts(&self, unit: &ImportUnit) -> bool {
        unit.generations.intersects(&self.generations)
    }

    /// The library volumes: a baseline volume, a larger one that adds
    /// everything needing the later major OS version, and a modern-variant
    /// volume built from a fresh base
    pub fn defaults() -> Vec<VolumeVariant> {
        vec![
            VolumeVariant {
                name: "Infinite HD6".to_string(),
                generations: GenerationSet::baseline(),
                extends: None,
                size_bytes: 1000 * MIB,
                block_alignment: default_block_alignment(),
                bootable: false,
            },
            VolumeVariant {
                name: "Infinite HD".to_string(),
                generations: [Generation::Baseline, Generation::NeedsLegacyMajorVersion]
                    .into_iter()
                    .collect(),
                extends: Some("Infinite HD6".to_string()),
                size_bytes: 2000 * MIB,
                block_alignment: default_block_alignment(),
                bootable: false,
            },
            VolumeVariant {
                name: "Infinite HDX".to_string(),
                generations: GenerationSet::from_iter([Generation::NeedsModernVariant]),
                extends: None,
                size_bytes: 2500 * MIB,
                block_alignment: default_block_alignment(),
                bootable: false,
            },
        ]
    }

    /// File name of the serialized image
    pub fn image_file_name(&self) -> String {
        format!("{}.dsk", self.name)
    }
}

/// What the serializer is asked to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeRequest {
    pub volume_name: String,
    pub size_bytes: u64,
    pub block_alignment: u32,
    pub bootable: bool,
}

impl From<&VolumeVariant> for SerializeRequest {
    fn from(variant: &VolumeVariant) -> Self {
        Self {
            volume_name: variant.name.clone(),
            size_bytes: variant.size_bytes,
            block_alignment: variant.block_alignment,
            bootable: variant.bootable,
        }
    }
}

/// Turns a destination tree into a flat volume image
pub trait FilesystemSerializer: Send + Sync {
    fn serialize(&self, tree: &Folder, request: &SerializeRequest) -> Result<Vec<u8>, String>;
}

/// Rebuilds the desktop database of a serialized image in place
pub trait DesktopDbRebuilder: Send + Sync {
    fn rebuild(&self, volume_name: &str, image: &mut Vec<u8>) -> Result<(), String>;
}

/// Every external collaborator the pipeline drives
pub struct Collaborators {
    pub import: ImportCollaborators,
    pub serializer: Box<dyn FilesystemSerializer>,
    pub desktop_db: Option<Box<dyn DesktopDbRebuilder>>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub volumes: Vec<VolumeVariant>,
    pub chunk_size: usize,
    pub manifest_dir: PathBuf,
    pub conflict_policy: ConflictPolicy,
    /// Also keep each serialized image here
    pub image_dir: Option<PathBuf>,
}

/// A unit left out of the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub id: String,
    pub reason: String,
}

/// A chunked image and where its manifest was written
#[derive(Debug, Clone)]
pub struct ChunkedImage {
    pub manifest: ContentManifest,
    pub manifest_path: PathBuf,
    pub stats: ChunkStats,
}

#[derive(Debug, Clone)]
pub struct VolumeSummary {
    pub name: String,
    /// Hex fingerprint of the merged tree
    pub fingerprint: String,
    /// Ids of every unit present in the volume, inherited ones included
    pub units: Vec<String>,
    pub merge: MergeReport,
    pub image: ChunkedImage,
    /// Serialized image on disk, when an image directory is configured
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub volumes: Vec<VolumeSummary>,
    pub skipped: Vec<SkippedUnit>,
}

/// Merged state of a finished variant, kept for variants extending it
struct VariantState {
    tree: Folder,
    units: Vec<String>,
}

pub struct BuildPipeline<'a> {
    collaborators: &'a Collaborators,
    store: &'a dyn ChunkStore,
    options: PipelineOptions,
    now: DateTime<Utc>,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        collaborators: &'a Collaborators,
        store: &'a dyn ChunkStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            collaborators,
            store,
            options,
            now: Utc::now(),
        }
    }

    /// Fix "now" for date clamping
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Build every configured volume from `units` on top of `base_image`
    #[instrument(skip_all, fields(units = units.len(), volumes = self.options.volumes.len()))]
    pub fn run(&self, mut units: Vec<ImportUnit>, base_image: &[u8]) -> Result<BuildSummary, BuildError> {
        self.check_volumes()?;
        units.sort_by(|a, b| a.id.cmp(&b.id));

        let mut summary = BuildSummary::default();
        let resolved = self.resolve(&units, &mut summary.skipped)?;
        info!(resolved = resolved.len(), skipped = summary.skipped.len(), "Resolved import units");

        let base = self
            .collaborators
            .import
            .volume_reader
            .read_volume(base_image)
            .map_err(|e| BuildError::VolumeRead {
                volume: "base image".to_string(),
                reason: e.to_string(),
            })?;

        let mut finished: HashMap<String, VariantState> = HashMap::new();
        for variant in &self.options.volumes {
            let (state, merge_report) = self.merge_variant(variant, &base, &resolved, &finished)?;
            let volume = self.publish_variant(variant, &state, merge_report)?;
            summary.volumes.push(volume);
            finished.insert(variant.name.clone(), state);
        }

        Ok(summary)
    }

    fn check_volumes(&self) -> Result<(), BuildError> {
        let mut seen = HashSet::new();
        for variant in &self.options.volumes {
            if let Some(parent) = &variant.extends {
                if !seen.contains(parent.as_str()) {
                    return Err(BuildError::ConfigError(format!(
                        "volume {:?} extends {:?}, which is not defined before it",
                        variant.name, parent
                    )));
                }
            }
            if !seen.insert(variant.name.as_str()) {
                return Err(BuildError::ConfigError(format!(
                    "volume {:?} is defined twice",
                    variant.name
                )));
            }
        }
        Ok(())
    }

    /// Resolve units in parallel, applying the failure policy in unit order
    fn resolve<'u>(
        &self,
        units: &'u [ImportUnit],
        skipped: &mut Vec<SkippedUnit>,
    ) -> Result<Vec<(&'u ImportUnit, Subtree)>, BuildError> {
        let results = Resolver::new(&self.collaborators.import)
            .with_now(self.now)
            .resolve_all(units);

        let mut resolved = Vec::with_capacity(units.len());
        for (unit, result) in units.iter().zip(results) {
            match result {
                Ok(subtree) => resolved.push((unit, subtree)),
                Err(e) if e.is_fatal_for_run() => {
                    error!(unit = %unit.id, error = %e, "Import configuration error");
                    return Err(BuildError::Import(e));
                }
                Err(e) if unit.required => {
                    error!(unit = %unit.id, error = %e, "Required import unit failed");
                    return Err(BuildError::RequiredUnitFailed {
                        unit: unit.id.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(unit = %unit.id, error = %e, "Skipping import unit");
                    skipped.push(SkippedUnit {
                        id: unit.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    #[instrument(skip_all, fields(volume = %variant.name))]
    fn merge_variant(
        &self,
        variant: &VolumeVariant,
        base: &Folder,
        resolved: &[(&ImportUnit, Subtree)],
        finished: &HashMap<String, VariantState>,
    ) -> Result<(VariantState, MergeReport), BuildError> {
        let (mut tree, mut units) = match variant.extends.as_ref().and_then(|p| finished.get(p)) {
            Some(parent) => (parent.tree.clone(), parent.units.clone()),
            None => (base.clone(), Vec::new()),
        };
        let inherited: HashSet<String> = units.iter().cloned().collect();

        let mut report = MergeReport::default();
        for (unit, subtree) in resolved {
            if !variant.accepts(unit) || inherited.contains(&unit.id) {
                continue;
            }
            merge(&mut tree, subtree.clone(), &mut report);
            if self.options.conflict_policy == ConflictPolicy::Fail {
                if let Some(warning) = report.warnings.first() {
                    return Err(BuildError::MergeConflict(format!(
                        "{} (unit {} in volume {})",
                        warning, unit.id, variant.name
                    )));
                }
            }
            units.push(unit.id.clone());
        }

        info!(
            merged = units.len() - inherited.len(),
            inherited = inherited.len(),
            conflicts = report.warnings.len(),
            "Merged volume tree"
        );
        Ok((VariantState { tree, units }, report))
    }

    #[instrument(skip_all, fields(volume = %variant.name))]
    fn publish_variant(
        &self,
        variant: &VolumeVariant,
        state: &VariantState,
        merge: MergeReport,
    ) -> Result<VolumeSummary, BuildError> {
        let fingerprint = hex::encode(fingerprint_folder(&state.tree));
        info!(fingerprint = %fingerprint, "Serializing volume");

        let request = SerializeRequest::from(variant);
        let mut image = self
            .collaborators
            .serializer
            .serialize(&state.tree, &request)
            .map_err(|reason| BuildError::Serialization {
                volume: variant.name.clone(),
                reason,
            })?;

        if let Some(rebuilder) = &self.collaborators.desktop_db {
            if let Err(reason) = rebuilder.rebuild(&variant.name, &mut image) {
                warn!(reason = %reason, "Failed to rebuild desktop database, will continue");
            }
        }

        let image_path = match &self.options.image_dir {
            Some(dir) => Some(write_image(dir, &variant.image_file_name(), &image)?),
            None => None,
        };

        let chunker = Chunker::new(self.store, self.options.chunk_size);
        let image = chunk_image_bytes(
            &chunker,
            &variant.name,
            &variant.image_file_name(),
            &image,
            &self.options.manifest_dir,
        )?;

        Ok(VolumeSummary {
            name: variant.name.clone(),
            fingerprint,
            units: state.units.clone(),
            merge,
            image,
            image_path,
        })
    }
}

fn write_image(dir: &Path, file_name: &str, image: &[u8]) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, image)?;
    info!(path = %path.display(), size = image.len(), "Wrote volume image");
    Ok(path)
}

/// Units a volume receives, inherited ones first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePlan {
    pub name: String,
    pub units: Vec<String>,
}

/// Which units end up in which volume, without resolving anything
///
/// Volumes are walked in order; a volume extending an earlier one starts
/// from that volume's unit list.
pub fn plan_volumes(volumes: &[VolumeVariant], units: &[ImportUnit]) -> Vec<VolumePlan> {
    let mut sorted: Vec<&ImportUnit> = units.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut plans: Vec<VolumePlan> = Vec::with_capacity(volumes.len());
    for variant in volumes {
        let mut members = variant
            .extends
            .as_ref()
            .and_then(|parent| plans.iter().find(|plan| &plan.name == parent))
            .map(|plan| plan.units.clone())
            .unwrap_or_default();
        for unit in &sorted {
            if variant.accepts(unit) && !members.contains(&unit.id) {
                members.push(unit.id.clone());
            }
        }
        plans.push(VolumePlan {
            name: variant.name.clone(),
            units: members,
        });
    }
    plans
}

/// Manifest location for an image file name
pub fn manifest_path(manifest_dir: &Path, image_file_name: &str) -> PathBuf {
    manifest_dir.join(format!("{}.json", image_file_name))
}

/// Chunk `image` into the store, then write its manifest
pub fn chunk_image_bytes(
    chunker: &Chunker<'_>,
    name: &str,
    image_file_name: &str,
    image: &[u8],
    manifest_dir: &Path,
) -> Result<ChunkedImage, BuildError> {
    let (manifest, stats) = chunker.chunk_image(name, image)?;
    let path = write_content_manifest(manifest_dir, image_file_name, &manifest)?;
    Ok(ChunkedImage {
        manifest,
        manifest_path: path,
        stats,
    })
}

/// Write `manifest` as `<image_file_name>.json` in `manifest_dir`
pub fn write_content_manifest(
    manifest_dir: &Path,
    image_file_name: &str,
    manifest: &ContentManifest,
) -> Result<PathBuf, StoreError> {
    let path = manifest_path(manifest_dir, image_file_name);
    write_manifest(&path, manifest)?;
    info!(path = %path.display(), "Wrote manifest");
    Ok(path)
}

/// Chunk an image file that needs no merging (pass-through images)
pub fn chunk_image_file(
    chunker: &Chunker<'_>,
    image_path: &Path,
    manifest_dir: &Path,
) -> Result<ChunkedImage, BuildError> {
    let image = std::fs::read(image_path).map_err(|e| {
        BuildError::Import(ImportError::SourceResolution {
            locator: image_path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    let file_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| BuildError::ConfigError(format!("{:?} has no file name", image_path)))?;
    let name = image_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.clone());
    chunk_image_bytes(chunker, &name, &file_name, &image, manifest_dir)
}
