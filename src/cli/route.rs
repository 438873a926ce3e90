//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::chunk::{Chunker, Compression, ImageReader, SequentialChunker};
use crate::config::{BuildConfig, ConfigLoader};
use crate::error::{BuildError, ImportError, StoreError};
use crate::import::scan_library;
use crate::manifest::{read_manifest, write_manifest, ImageManifest, SequentialManifest};
use crate::pipeline::{chunk_image_bytes, chunk_image_file, plan_volumes, BuildPipeline};
use crate::store::FsChunkStore;
use crate::tools::command_collaborators;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::command_name;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_build_summary, format_chunk_result, format_plan_json, format_plan_text, format_sequential_result,
    format_verify_result, VerifyResult,
};

/// Runtime context for CLI execution: workspace and resolved configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: BuildConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, BuildError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: BuildConfig) -> Result<Self, BuildError> {
        config.ensure_valid()?;
        debug!(workspace = %workspace_root.display(), "Run context ready");
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, BuildError> {
        let started = Instant::now();
        let result = match command {
            Commands::Plan { filter, format } => self.handle_plan(filter.as_deref(), format),
            Commands::Build { filter } => self.handle_build(filter.as_deref()),
            Commands::Chunk { image, name } => self.handle_chunk(image, name.as_deref()),
            Commands::Sequential {
                image,
                out,
                compress,
            } => self.handle_sequential(image, out, *compress),
            Commands::Verify { manifest, image } => self.handle_verify(manifest, image.as_deref()),
            Commands::ClearStore => self.handle_clear_store(),
        };
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn open_store(&self) -> Result<FsChunkStore, BuildError> {
        Ok(FsChunkStore::new(&self.config.store_dir)?)
    }

    fn handle_plan(&self, filter: Option<&str>, format: &str) -> Result<String, BuildError> {
        let filter = filter.or(self.config.library_filter.as_deref());
        let units = scan_library(
            &self.config.library_dir,
            filter,
            &self.config.prepackaged_generations,
        )?;
        let plans = plan_volumes(&self.config.volumes, &units);
        match format {
            "json" => format_plan_json(&units, &self.config.volumes, &plans),
            "text" => Ok(format_plan_text(&units, &self.config.volumes, &plans)),
            other => Err(BuildError::ConfigError(format!(
                "Unknown output format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn handle_build(&self, filter: Option<&str>) -> Result<String, BuildError> {
        let filter = filter.or(self.config.library_filter.as_deref());
        let units = scan_library(
            &self.config.library_dir,
            filter,
            &self.config.prepackaged_generations,
        )?;
        let base_image = read_image(&self.config.base_image)?;
        let collaborators = command_collaborators(&self.config)?;

        let store = self.open_store()?;
        let cleared = if self.config.clear_store {
            let removed = store.clear()?;
            info!(removed, store = %store.root().display(), "Cleared chunk store");
            Some(removed)
        } else {
            None
        };

        let summary = BuildPipeline::new(&collaborators, &store, self.config.to_pipeline_options())
            .run(units, &base_image)?;
        Ok(format_build_summary(&summary, cleared))
    }

    fn handle_chunk(&self, image: &Path, name: Option<&str>) -> Result<String, BuildError> {
        let store = self.open_store()?;
        let chunker = Chunker::new(&store, self.config.chunk_size);
        let result = match name {
            Some(name) => {
                let bytes = read_image(image)?;
                let file_name = image_file_name(image)?;
                chunk_image_bytes(&chunker, name, &file_name, &bytes, &self.config.manifest_dir)?
            }
            None => chunk_image_file(&chunker, image, &self.config.manifest_dir)?,
        };
        Ok(format_chunk_result(&result))
    }

    fn handle_sequential(&self, image: &Path, out: &Path, compress: bool) -> Result<String, BuildError> {
        let compression = if compress {
            Compression::default()
        } else {
            Compression::None
        };
        let bytes = read_image(image)?;
        let file_name = image_file_name(image)?;
        let manifest = SequentialChunker::new(self.config.chunk_size, compression)
            .write(&file_name, &bytes, out)?;
        let manifest_path = out.join(format!("{}.json", file_name));
        write_manifest(&manifest_path, &manifest)?;
        Ok(format_sequential_result(&manifest, &manifest_path))
    }

    fn handle_verify(&self, manifest_path: &Path, image: Option<&Path>) -> Result<String, BuildError> {
        let manifest = read_manifest(manifest_path)?;
        let expected = image.map(read_image).transpose()?;

        let matches = match &manifest {
            ImageManifest::Content(content) => {
                let store = self.open_store()?;
                let reader = ImageReader::new(content, &store)?;
                match &expected {
                    Some(expected) => Some(reader.verify(expected)?),
                    None => {
                        reader.reconstruct()?;
                        None
                    }
                }
            }
            ImageManifest::Sequential(sequential) => {
                let rebuilt = read_sequential(sequential, manifest_path)?;
                expected.as_ref().map(|expected| expected == &rebuilt)
            }
        };

        Ok(format_verify_result(&VerifyResult {
            manifest_path: manifest_path.to_path_buf(),
            total_size: manifest.total_size(),
            matches,
        }))
    }

    fn handle_clear_store(&self) -> Result<String, BuildError> {
        let store = self.open_store()?;
        let removed = store.clear()?;
        Ok(format!(
            "Removed {} chunks from {}",
            removed,
            store.root().display()
        ))
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>, BuildError> {
    std::fs::read(path).map_err(|e| {
        BuildError::Import(ImportError::SourceResolution {
            locator: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

fn image_file_name(path: &Path) -> Result<String, BuildError> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| BuildError::ConfigError(format!("{:?} has no file name", path)))
}

/// Chunk files sit next to `<image>.json`; compression is detected from the first chunk
fn read_sequential(manifest: &SequentialManifest, manifest_path: &Path) -> Result<Vec<u8>, BuildError> {
    let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let image_name = manifest_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| {
            BuildError::Store(StoreError::Manifest(format!(
                "{:?} has no file name",
                manifest_path
            )))
        })?;
    let compressed = SequentialChunker::new(manifest.chunk_size as usize, Compression::default());
    let chunker = if compressed.chunk_path(dir, &image_name, 0).exists() {
        compressed
    } else {
        SequentialChunker::new(manifest.chunk_size as usize, Compression::None)
    };
    Ok(chunker.read(manifest, &image_name, dir)?)
}
