//! Assemble folders from prepackaged entry lists
//!
//! A prepackaged bundle is a flat list of `path -> bytes` entries. Besides
//! regular file contents it carries sidecar entries:
//!
//! - `DInfo` at the top level: the bundle root folder's DInfo + DXInfo
//! - `<dir>/.rsrc/<name>`: resource fork of `<dir>/<name>`
//! - `<dir>/.finf/<name>`: FInfo + FXInfo of file `<dir>/<name>`, or DInfo +
//!   DXInfo of folder `<dir>/<name>` when the bundle lists `<dir>/<name>/`
//!   as a directory entry
//!
//! Sidecars may appear before or after the entry they describe. Folders and
//! files keep the order in which the bundle first mentions them.

use crate::error::{CodecError, ImportError};
use crate::finder::{FileInfo, FolderInfo, FOLDER_INFO_LEN};
use crate::tree::node::{File, Folder, Node};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

const ROOT_INFO_ENTRY: &str = "DInfo";
const RESOURCE_FORK_INFIX: &str = ".rsrc/";
const FINDER_INFO_INFIX: &str = ".finf/";

/// One entry of a prepackaged bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepackagedEntry {
    /// `/`-separated path; directories end with `/`
    pub path: String,
    pub data: Vec<u8>,
}

impl PrepackagedEntry {
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            data: Vec::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }
}

#[derive(Default)]
struct PendingFile {
    data: Option<Vec<u8>>,
    resource_fork: Option<Vec<u8>>,
    finder_info: Option<Vec<u8>>,
}

impl PendingFile {
    fn has_forks(&self) -> bool {
        self.data.is_some() || self.resource_fork.is_some()
    }
}

/// Decoded 32-byte folder sidecar
struct FolderSidecar {
    info: FolderInfo,
    extra: [u8; 16],
}

impl FolderSidecar {
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != FOLDER_INFO_LEN * 2 {
            return Err(CodecError::InvalidLength {
                what: "folder sidecar",
                expected: FOLDER_INFO_LEN * 2,
                actual: bytes.len(),
            });
        }
        let mut extra = [0u8; 16];
        extra.copy_from_slice(&bytes[FOLDER_INFO_LEN..]);
        Ok(Self {
            info: FolderInfo::decode(&bytes[..FOLDER_INFO_LEN])?,
            extra,
        })
    }
}

enum Pending {
    Folder(Option<Vec<u8>>),
    File(PendingFile),
}

fn file_slot<'p>(
    pending: &'p mut IndexMap<String, Pending>,
    path: String,
) -> Result<&'p mut PendingFile, ImportError> {
    match pending
        .entry(path.clone())
        .or_insert_with(|| Pending::File(PendingFile::default()))
    {
        Pending::File(file) => Ok(file),
        Pending::Folder(_) => Err(ImportError::Format(format!(
            "prepackaged file {} collides with a folder",
            path
        ))),
    }
}

/// Build a folder from prepackaged entries
pub fn assemble(entries: Vec<PrepackagedEntry>) -> Result<Folder, ImportError> {
    // A `.finf` sidecar names a folder only when the bundle lists that folder
    // explicitly, wherever the directory entry sits in the bundle.
    let explicit: HashSet<String> = entries
        .iter()
        .filter(|e| e.is_directory())
        .map(|e| e.path.trim_end_matches('/').to_string())
        .collect();

    let mut root_info: Option<Vec<u8>> = None;
    let mut pending: IndexMap<String, Pending> = IndexMap::new();

    for entry in entries {
        if entry.is_directory() {
            let path = entry.path.trim_end_matches('/');
            if !path.is_empty() && !is_sidecar_directory(path) {
                pending
                    .entry(path.to_string())
                    .or_insert(Pending::Folder(None));
            }
            continue;
        }
        let path = entry.path;
        if path == ROOT_INFO_ENTRY {
            root_info = Some(entry.data);
        } else if path.contains(RESOURCE_FORK_INFIX) {
            let target = path.replacen(RESOURCE_FORK_INFIX, "", 1);
            file_slot(&mut pending, target)?.resource_fork = Some(entry.data);
        } else if path.contains(FINDER_INFO_INFIX) {
            let target = path.replacen(FINDER_INFO_INFIX, "", 1);
            if explicit.contains(&target) {
                pending.insert(target, Pending::Folder(Some(entry.data)));
            } else {
                file_slot(&mut pending, target)?.finder_info = Some(entry.data);
            }
        } else {
            file_slot(&mut pending, path)?.data = Some(entry.data);
        }
    }

    let mut root = Folder::new();
    if let Some(bytes) = root_info {
        let sidecar = FolderSidecar::decode(&bytes)?;
        root.info = sidecar.info;
        root.extra_info = sidecar.extra;
    }

    let mut info_only = Vec::new();
    for (path, item) in pending {
        match item {
            Pending::Folder(info) => {
                let folder = ensure_folder(&mut root, &path).ok_or_else(|| {
                    ImportError::Format(format!(
                        "prepackaged folder {} collides with a file",
                        path
                    ))
                })?;
                if let Some(bytes) = info {
                    let sidecar = FolderSidecar::decode(&bytes)?;
                    folder.info = sidecar.info;
                    folder.extra_info = sidecar.extra;
                }
            }
            Pending::File(file) if !file.has_forks() => info_only.push((path, file)),
            Pending::File(file) => insert_file(&mut root, &path, file)?,
        }
    }

    // Finder info with no forks is an empty file unless a folder took the name.
    for (path, file) in info_only {
        let (parent_path, name) = split_parent(&path);
        let taken = ensure_folder(&mut root, parent_path)
            .map(|parent| parent.contains(name))
            .unwrap_or(false);
        if taken {
            warn!(path = %path, "Finder info sidecar without a matching entry");
            continue;
        }
        insert_file(&mut root, &path, file)?;
    }

    Ok(root)
}

fn insert_file(root: &mut Folder, path: &str, pending: PendingFile) -> Result<(), ImportError> {
    let (parent_path, name) = split_parent(path);
    let parent = ensure_folder(root, parent_path).ok_or_else(|| {
        ImportError::Format(format!("prepackaged file {} has a file as parent", path))
    })?;
    if pending.data.is_none() {
        debug!(path = %path, "Prepackaged file without data fork");
    }
    let mut file = File {
        data: pending.data.unwrap_or_default(),
        resource_fork: pending.resource_fork.unwrap_or_default(),
        ..Default::default()
    };
    if let Some(bytes) = pending.finder_info {
        file.info = FileInfo::decode(&bytes)?;
    }
    parent.insert(name, file);
    Ok(())
}

/// Flatten a folder into prepackaged entries
///
/// Inverse of [`assemble`]: every folder gets an explicit directory entry so
/// its `.finf` sidecar reads back as folder info, and every file gets a data
/// entry even when its data fork is empty.
pub fn disassemble(root: &Folder) -> Vec<PrepackagedEntry> {
    let mut entries = vec![PrepackagedEntry::file(
        ROOT_INFO_ENTRY,
        folder_sidecar_bytes(root),
    )];
    push_children(root, "", &mut entries);
    entries
}

fn push_children(folder: &Folder, prefix: &str, entries: &mut Vec<PrepackagedEntry>) {
    for (name, node) in folder.children() {
        // `/` inside a name is stored escaped, as the extractor does
        let name = name.replace('/', ":");
        let path = format!("{}{}", prefix, name);
        let sidecar = format!("{}{}{}", prefix, FINDER_INFO_INFIX, name);
        match node {
            Node::Folder(child) => {
                entries.push(PrepackagedEntry::directory(path.clone()));
                entries.push(PrepackagedEntry::file(sidecar, folder_sidecar_bytes(child)));
                push_children(child, &format!("{}/", path), entries);
            }
            Node::File(file) => {
                entries.push(PrepackagedEntry::file(path, file.data.clone()));
                if !file.resource_fork.is_empty() {
                    entries.push(PrepackagedEntry::file(
                        format!("{}{}{}", prefix, RESOURCE_FORK_INFIX, name),
                        file.resource_fork.clone(),
                    ));
                }
                entries.push(PrepackagedEntry::file(sidecar, file.info.encode().to_vec()));
            }
        }
    }
}

fn folder_sidecar_bytes(folder: &Folder) -> Vec<u8> {
    let mut bytes = folder.info.encode().to_vec();
    bytes.extend_from_slice(&folder.extra_info);
    bytes
}

/// `.rsrc` and `.finf` directories hold sidecars, never volume folders
fn is_sidecar_directory(path: &str) -> bool {
    let (_, name) = split_parent(path);
    matches!(name, ".rsrc" | ".finf")
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn ensure_folder<'f>(root: &'f mut Folder, path: &str) -> Option<&'f mut Folder> {
    let mut folder = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        folder = folder.folder_entry(segment)?;
    }
    Some(folder)
}
