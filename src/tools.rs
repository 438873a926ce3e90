//! External tools
//!
//! Command-line programs backing the collaborators the core leaves to the
//! outside: archive unpacking, reading and writing volume images, and the
//! desktop database. Each tool is a command template whose `{name}`
//! placeholders are filled in per call. Volume trees cross the process
//! boundary as prepackaged `.zip` bundles.

use crate::config::BuildConfig;
use crate::error::{BuildError, ImportError};
use crate::import::collab::write_zip_bundle;
use crate::import::{
    ArchiveExtractor, ImportCollaborators, LocalFetcher, PrepackagedReader, VolumeReader,
    ZipPrepackagedReader,
};
use crate::pipeline::{Collaborators, DesktopDbRebuilder, FilesystemSerializer, SerializeRequest};
use crate::tree::prepackaged::{assemble, disassemble};
use crate::tree::walker::MetadataIndex;
use crate::tree::Folder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::{debug, info};

/// Program and arguments with `{placeholder}` substitution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    /// Arguments with every `{key}` replaced by its value
    pub fn expand(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.0
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |arg, (key, value)| {
                    arg.replace(&format!("{{{}}}", key), value)
                })
            })
            .collect()
    }

    /// Run to completion, returning stdout
    pub fn run(&self, vars: &[(&str, &str)]) -> Result<Vec<u8>, String> {
        let args = self.expand(vars);
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| "no command configured".to_string())?;
        debug!(program = %program, args = ?rest, "Running external tool");
        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("failed to run {}: {}", program, e))?;
        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output.stdout)
    }
}

/// Commands for each external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Unpacks `{archive}` into `{dest}`
    #[serde(default = "default_extract_command")]
    pub extract: CommandTemplate,

    /// Prints the JSON listing (`lsarContents`) of `{archive}`
    #[serde(default = "default_list_command")]
    pub list: CommandTemplate,

    /// Writes the tree of volume `{image}` as a prepackaged bundle to `{bundle}`
    #[serde(default)]
    pub read_volume: CommandTemplate,

    /// Writes volume `{image}` from the prepackaged bundle `{bundle}`.
    /// Also receives `{name}`, `{size}`, `{alignment}` and `{bootable}`.
    #[serde(default)]
    pub serialize: CommandTemplate,

    /// Rebuilds the desktop database of `{image}` (volume `{name}`) in place
    #[serde(default)]
    pub desktop_db: CommandTemplate,
}

fn default_extract_command() -> CommandTemplate {
    CommandTemplate::new(["unar", "-no-directory", "-output-directory", "{dest}", "{archive}"])
}

fn default_list_command() -> CommandTemplate {
    CommandTemplate::new(["lsar", "-json", "{archive}"])
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            extract: default_extract_command(),
            list: default_list_command(),
            read_volume: CommandTemplate::default(),
            serialize: CommandTemplate::default(),
            desktop_db: CommandTemplate::default(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Unpacks with one command and reads Finder metadata from another
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    extract: CommandTemplate,
    list: CommandTemplate,
}

impl CommandExtractor {
    pub fn new(extract: CommandTemplate, list: CommandTemplate) -> Self {
        Self { extract, list }
    }
}

impl ArchiveExtractor for CommandExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<MetadataIndex, ImportError> {
        let failed = |reason: String| ImportError::ArchiveExtraction {
            locator: archive.display().to_string(),
            reason,
        };
        let archive_arg = path_arg(archive);
        let dest_arg = path_arg(dest);

        self.extract
            .run(&[("archive", archive_arg.as_str()), ("dest", dest_arg.as_str())])
            .map_err(failed)?;
        let listing = self
            .list
            .run(&[("archive", archive_arg.as_str())])
            .map_err(failed)?;
        MetadataIndex::from_listing_json(&String::from_utf8_lossy(&listing))
            .map_err(|e| failed(format!("unreadable listing: {}", e)))
    }
}

/// Reads a volume through a command that dumps it as a prepackaged bundle
#[derive(Debug, Clone)]
pub struct CommandVolumeReader {
    command: CommandTemplate,
}

impl CommandVolumeReader {
    pub fn new(command: CommandTemplate) -> Self {
        Self { command }
    }
}

impl VolumeReader for CommandVolumeReader {
    fn read_volume(&self, image: &[u8]) -> Result<Folder, ImportError> {
        let scratch = TempDir::new()?;
        let image_path = scratch.path().join("volume.dsk");
        let bundle_path = scratch.path().join("volume.zip");
        std::fs::write(&image_path, image)?;

        self.command
            .run(&[
                ("image", path_arg(&image_path).as_str()),
                ("bundle", path_arg(&bundle_path).as_str()),
            ])
            .map_err(|reason| ImportError::ArchiveExtraction {
                locator: format!("volume image ({} bytes)", image.len()),
                reason,
            })?;
        assemble(ZipPrepackagedReader.read_entries(&bundle_path)?)
    }
}

/// Serializes a tree by handing a prepackaged bundle to a command
#[derive(Debug, Clone)]
pub struct CommandSerializer {
    command: CommandTemplate,
}

impl CommandSerializer {
    pub fn new(command: CommandTemplate) -> Self {
        Self { command }
    }
}

impl FilesystemSerializer for CommandSerializer {
    fn serialize(&self, tree: &Folder, request: &SerializeRequest) -> Result<Vec<u8>, String> {
        let scratch = TempDir::new().map_err(|e| e.to_string())?;
        let bundle_path = scratch.path().join("tree.zip");
        let image_path = scratch.path().join("volume.dsk");
        write_zip_bundle(&bundle_path, &disassemble(tree)).map_err(|e| e.to_string())?;

        self.command.run(&[
            ("bundle", path_arg(&bundle_path).as_str()),
            ("image", path_arg(&image_path).as_str()),
            ("name", request.volume_name.as_str()),
            ("size", request.size_bytes.to_string().as_str()),
            ("alignment", request.block_alignment.to_string().as_str()),
            ("bootable", if request.bootable { "true" } else { "false" }),
        ])?;

        let image = std::fs::read(&image_path)
            .map_err(|e| format!("serializer produced no image: {}", e))?;
        if image.len() as u64 != request.size_bytes {
            return Err(format!(
                "serializer produced {} bytes, expected {}",
                image.len(),
                request.size_bytes
            ));
        }
        Ok(image)
    }
}

#[derive(Debug, Clone)]
pub struct CommandDesktopDb {
    command: CommandTemplate,
}

impl CommandDesktopDb {
    pub fn new(command: CommandTemplate) -> Self {
        Self { command }
    }
}

impl DesktopDbRebuilder for CommandDesktopDb {
    fn rebuild(&self, volume_name: &str, image: &mut Vec<u8>) -> Result<(), String> {
        let scratch = TempDir::new().map_err(|e| e.to_string())?;
        let image_path = scratch.path().join("volume.dsk");
        std::fs::write(&image_path, image.as_slice()).map_err(|e| e.to_string())?;
        self.command.run(&[
            ("image", path_arg(&image_path).as_str()),
            ("name", volume_name),
        ])?;
        *image = std::fs::read(&image_path).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Collaborators backed by the configured tools
///
/// Fails when the volume reader or serializer command is missing; the
/// desktop database step is skipped when its command is empty.
pub fn command_collaborators(config: &BuildConfig) -> Result<Collaborators, BuildError> {
    let tools = &config.tools;
    for (key, command) in [
        ("tools.read_volume", &tools.read_volume),
        ("tools.serialize", &tools.serialize),
    ] {
        if !command.is_configured() {
            return Err(BuildError::ConfigError(format!(
                "{} is not configured",
                key
            )));
        }
    }

    let desktop_db: Option<Box<dyn DesktopDbRebuilder>> = if tools.desktop_db.is_configured() {
        Some(Box::new(CommandDesktopDb::new(tools.desktop_db.clone())))
    } else {
        None
    };
    let cache_dir = config.cache_dir()?;
    info!(cache = %cache_dir.display(), desktop_db = desktop_db.is_some(), "Using external tools");

    Ok(Collaborators {
        import: ImportCollaborators {
            fetcher: Box::new(LocalFetcher::new(&config.library_dir, cache_dir)),
            extractor: Box::new(CommandExtractor::new(
                tools.extract.clone(),
                tools.list.clone(),
            )),
            volume_reader: Box::new(CommandVolumeReader::new(tools.read_volume.clone())),
            prepackaged_reader: Box::new(ZipPrepackagedReader),
        },
        serializer: Box::new(CommandSerializer::new(tools.serialize.clone())),
        desktop_db,
    })
}
