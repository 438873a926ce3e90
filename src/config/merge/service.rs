//! MergeService: orchestrates sources, applies merge policy, deserializes to BuildConfig.

use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::BuildConfig;
use config::ConfigError;
use config::File;
use std::path::Path;
use tracing::debug;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from workspace and standard sources.
    /// Precedence: defaults -> global file -> workspace base -> workspace env -> environment.
    pub fn load(workspace_root: &Path) -> Result<BuildConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder)?;

        let mut config: BuildConfig = builder.build()?.try_deserialize()?;
        config.resolve_paths(workspace_root);
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load config from a specific file with environment overlay.
    /// Relative paths resolve against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<BuildConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path));
        let builder = environment::add_to_builder(builder)?;

        let mut config: BuildConfig = builder.build()?.try_deserialize()?;
        if let Some(parent) = path.parent() {
            config.resolve_paths(parent);
        }
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }
}
