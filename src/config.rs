//! Configuration System
//!
//! Layered build configuration: built-in defaults, the global config file,
//! workspace config files and `INFINITE_HD__*` environment variables, in
//! increasing precedence. Relative paths resolve against the workspace root.

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::BuildError;
use crate::import::{Generation, GenerationSet};
use crate::logging::LoggingConfig;
use crate::pipeline::{PipelineOptions, VolumeVariant};
use crate::tools::ToolsConfig;
use crate::tree::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Import manifests and prepackaged bundles
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Where `build` keeps the serialized volume images
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Image whose tree every volume starts from
    #[serde(default = "default_base_image")]
    pub base_image: PathBuf,

    /// Content-addressed chunk store
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Where image manifests are written
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,

    /// Download cache for URL sources; defaults to the platform cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Only import units whose id contains this string
    #[serde(default)]
    pub library_filter: Option<String>,

    /// Empty the chunk store before building
    #[serde(default)]
    pub clear_store: bool,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Output volumes in build order
    #[serde(default = "VolumeVariant::defaults")]
    pub volumes: Vec<VolumeVariant>,

    /// Generation tags of prepackaged bundles, keyed by unit id
    #[serde(default = "default_prepackaged_generations")]
    pub prepackaged_generations: HashMap<String, GenerationSet>,

    /// External programs used by `build`
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("Library")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("Images/volumes")
}

fn default_base_image() -> PathBuf {
    PathBuf::from("Images/Infinite HD.dsk")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("Images/build")
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("Data")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Bundles that only run on the later major OS version
fn default_prepackaged_generations() -> HashMap<String, GenerationSet> {
    let legacy: GenerationSet = [Generation::NeedsLegacyMajorVersion].into_iter().collect();
    [
        "Games/Bungie/Marathon Infinity",
        "Graphics/Adobe Photoshop 3.0",
        "Graphics/Canvas 3.5",
        "Graphics/Infini-D",
    ]
    .into_iter()
    .map(|id| (id.to_string(), legacy.clone()))
    .collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            images_dir: default_images_dir(),
            base_image: default_base_image(),
            store_dir: default_store_dir(),
            manifest_dir: default_manifest_dir(),
            cache_dir: None,
            chunk_size: default_chunk_size(),
            library_filter: None,
            clear_store: false,
            conflict_policy: ConflictPolicy::default(),
            volumes: VolumeVariant::defaults(),
            prepackaged_generations: default_prepackaged_generations(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Chunking(String),
    Volume(String, String),
    Paths(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Chunking(msg) => write!(f, "Chunking: {}", msg),
            ValidationError::Volume(name, msg) => write!(f, "Volume '{}': {}", name, msg),
            ValidationError::Paths(msg) => write!(f, "Paths: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl BuildConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push(ValidationError::Chunking(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        for (name, path) in [
            ("library_dir", &self.library_dir),
            ("images_dir", &self.images_dir),
            ("base_image", &self.base_image),
            ("store_dir", &self.store_dir),
            ("manifest_dir", &self.manifest_dir),
        ] {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Paths(format!("{} cannot be empty", name)));
            }
        }

        if self.volumes.is_empty() {
            errors.push(ValidationError::Paths("no volumes configured".to_string()));
        }

        let mut defined = HashSet::new();
        for volume in &self.volumes {
            if volume.name.trim().is_empty() {
                errors.push(ValidationError::Volume(
                    volume.name.clone(),
                    "name cannot be empty".to_string(),
                ));
            }
            if volume.size_bytes == 0 {
                errors.push(ValidationError::Volume(
                    volume.name.clone(),
                    "size_bytes must be greater than zero".to_string(),
                ));
            }
            if volume.block_alignment == 0 {
                errors.push(ValidationError::Volume(
                    volume.name.clone(),
                    "block_alignment must be greater than zero".to_string(),
                ));
            }
            if let Some(parent) = &volume.extends {
                if !defined.contains(parent.as_str()) {
                    errors.push(ValidationError::Volume(
                        volume.name.clone(),
                        format!("extends '{}', which is not defined before it", parent),
                    ));
                }
            }
            if !defined.insert(volume.name.as_str()) {
                errors.push(ValidationError::Volume(
                    volume.name.clone(),
                    "defined more than once".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one error
    pub fn ensure_valid(&self) -> Result<(), BuildError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            BuildError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Make every relative path absolute under `workspace_root`
    pub fn resolve_paths(&mut self, workspace_root: &Path) {
        for path in [
            &mut self.library_dir,
            &mut self.images_dir,
            &mut self.base_image,
            &mut self.store_dir,
            &mut self.manifest_dir,
        ] {
            if path.is_relative() {
                *path = workspace_root.join(&*path);
            }
        }
        if let Some(cache_dir) = self.cache_dir.as_mut() {
            if cache_dir.is_relative() {
                *cache_dir = workspace_root.join(&*cache_dir);
            }
        }
    }

    /// Download cache, falling back to the platform cache directory
    pub fn cache_dir(&self) -> Result<PathBuf, BuildError> {
        if let Some(cache_dir) = &self.cache_dir {
            return Ok(cache_dir.clone());
        }
        directories::ProjectDirs::from("", "", "infinite-hd")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .ok_or_else(|| {
                BuildError::ConfigError("Could not determine platform cache directory".to_string())
            })
    }

    pub fn to_pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            volumes: self.volumes.clone(),
            chunk_size: self.chunk_size,
            manifest_dir: self.manifest_dir.clone(),
            conflict_policy: self.conflict_policy,
            image_dir: Some(self.images_dir.clone()),
        }
    }
}
