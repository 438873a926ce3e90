//! Merge rules: defaults, override order, conflict handling.

use crate::chunk::DEFAULT_CHUNK_SIZE;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Volumes and prepackaged generations default through serde, so a file
/// that sets either replaces the whole list or map.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("library_dir", "Library")?
        .set_default("images_dir", "Images")?
        .set_default("base_image", "Images/Infinite HD.dsk")?
        .set_default("store_dir", "Images/build")?
        .set_default("manifest_dir", "Data")?
        .set_default("chunk_size", DEFAULT_CHUNK_SIZE as u64)?
        .set_default("clear_store", false)?
        .set_default("conflict_policy", "skip")
}
