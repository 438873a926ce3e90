//! Integration tests for layered configuration loading

use infinite_hd::config::{BuildConfig, ConfigLoader, ValidationError};
use infinite_hd::import::Generation;
use infinite_hd::tree::ConflictPolicy;
use std::fs;
use tempfile::TempDir;

fn write_config(workspace: &TempDir, name: &str, contents: &str) {
    let dir = workspace.path().join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_empty_workspace_uses_defaults() {
    let workspace = TempDir::new().unwrap();
    let config = ConfigLoader::load(workspace.path()).unwrap();
    let defaults = BuildConfig::default();

    assert_eq!(config.chunk_size, defaults.chunk_size);
    assert_eq!(config.volumes, defaults.volumes);
    assert_eq!(config.store_dir, workspace.path().join("Images/build"));
    assert_eq!(
        config.base_image,
        workspace.path().join("Images/Infinite HD.dsk")
    );
}

#[test]
fn test_environment_file_overrides_base_file() {
    if std::env::var("INFINITE_HD_ENV").is_ok() {
        return;
    }
    let workspace = TempDir::new().unwrap();
    write_config(
        &workspace,
        "config.toml",
        "chunk_size = 131072\nlibrary_filter = \"Games\"\n",
    );
    write_config(&workspace, "development.toml", "chunk_size = 65536\n");

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.chunk_size, 65536);
    assert_eq!(config.library_filter.as_deref(), Some("Games"));
}

#[test]
fn test_volumes_and_logging_from_file() {
    let workspace = TempDir::new().unwrap();
    write_config(
        &workspace,
        "config.toml",
        r#"
conflict_policy = "fail"

[logging]
level = "debug"
format = "json"

[[volumes]]
name = "Small HD"
generations = ["baseline"]
size_bytes = 10485760

[[volumes]]
name = "Modern HD"
generations = ["baseline", "needs-modern-variant"]
extends = "Small HD"
size_bytes = 20971520
bootable = true
"#,
    );

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.conflict_policy, ConflictPolicy::Fail);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.volumes.len(), 2);
    assert!(config.volumes[1].generations.contains(Generation::NeedsModernVariant));
    assert!(config.volumes[1].bootable);
    assert!(config.validate().is_ok());

    let options = config.to_pipeline_options();
    assert_eq!(options.volumes[1].extends.as_deref(), Some("Small HD"));
}

#[test]
fn test_invalid_volume_graph_reported() {
    let workspace = TempDir::new().unwrap();
    write_config(
        &workspace,
        "config.toml",
        r#"
chunk_size = 0

[[volumes]]
name = "Child"
generations = ["baseline"]
extends = "Parent"
size_bytes = 1024
"#,
    );

    let config = ConfigLoader::load(workspace.path()).unwrap();
    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Chunking(_))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ValidationError::Volume(name, _) if name == "Child")));
}

#[test]
fn test_malformed_file_is_error() {
    let workspace = TempDir::new().unwrap();
    write_config(&workspace, "config.toml", "chunk_size = [\n");
    assert!(ConfigLoader::load(workspace.path()).is_err());
}

#[test]
fn test_tool_commands_from_file() {
    let workspace = TempDir::new().unwrap();
    write_config(
        &workspace,
        "config.toml",
        r#"
clear_store = true

[tools]
read_volume = ["hfsdump", "{image}", "{bundle}"]
serialize = ["mkhfs", "--size", "{size}", "{bundle}", "{image}"]
"#,
    );

    let config = ConfigLoader::load(workspace.path()).unwrap();
    let defaults = BuildConfig::default();
    assert!(config.clear_store);
    assert_eq!(config.images_dir, workspace.path().join("Images/volumes"));
    assert_eq!(
        config.tools.serialize.expand(&[("size", "1024"), ("bundle", "b.zip"), ("image", "v.dsk")]),
        vec!["mkhfs", "--size", "1024", "b.zip", "v.dsk"]
    );
    assert!(config.tools.read_volume.is_configured());
    assert!(!config.tools.desktop_db.is_configured());
    assert_eq!(config.tools.extract, defaults.tools.extract);
}
