//! Merge engine folding imported subtrees into a destination volume

use crate::tree::name::normalize_name;
use crate::tree::node::{Folder, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use tracing::{debug, instrument, warn};

/// Location of a subtree inside the destination volume
///
/// Segments are kept raw and normalized during the merge. An empty path
/// denotes the volume root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DestinationPath(Vec<String>);

impl DestinationPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a `/`-separated path; empty segments are ignored
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Build from a relative filesystem path
    pub fn from_relative_path(path: &Path) -> Self {
        Self(
            path.components()
                .filter_map(|component| match component {
                    Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

/// A resolved import: root node plus where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    pub destination: DestinationPath,
    pub root: Node,
}

impl Subtree {
    pub fn new(destination: DestinationPath, root: impl Into<Node>) -> Self {
        Self {
            destination,
            root: root.into(),
        }
    }
}

/// What to do when a subtree targets an occupied name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the first subtree, drop later ones with a warning
    #[default]
    Skip,
    /// Treat any conflict as a build failure
    Fail,
}

/// Reasons a subtree (or part of one) was not attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    /// Something is already installed under this path
    AlreadyInstalled(String),
    /// A file occupies a segment that needs to be a folder
    BlockedByFile(String),
    /// A file subtree was targeted at the volume root
    FileAtVolumeRoot,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::AlreadyInstalled(path) => {
                write!(f, "Skipping {}, already installed in the image", path)
            }
            MergeWarning::BlockedByFile(path) => {
                write!(f, "Skipping {}, a file is in the way", path)
            }
            MergeWarning::FileAtVolumeRoot => {
                write!(f, "Skipping file subtree targeted at the volume root")
            }
        }
    }
}

/// Result of merging one subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The whole subtree was attached
    Attached,
    /// Some children of a root-level subtree were skipped
    Partial,
    /// Nothing was attached
    Skipped,
}

/// Accumulated merge results for one destination tree
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub attached: Vec<String>,
    pub warnings: Vec<MergeWarning>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Merge one subtree into `root`
///
/// The first subtree to claim a name wins; later ones are dropped whole and
/// recorded as warnings, never merged field by field.
#[instrument(skip(root, subtree, report), fields(destination = %subtree.destination))]
pub fn merge(root: &mut Folder, subtree: Subtree, report: &mut MergeReport) -> MergeOutcome {
    let Subtree { destination, root: node } = subtree;
    let path = destination.to_string();

    let Some((last, parents)) = destination.segments().split_last() else {
        return merge_into_root(root, node, report);
    };

    let mut parent = root;
    for segment in parents {
        parent = match parent.folder_entry(segment) {
            Some(folder) => folder,
            None => {
                warn!(path = %path, segment = %segment, "Subtree blocked by a file");
                report.warnings.push(MergeWarning::BlockedByFile(path));
                return MergeOutcome::Skipped;
            }
        };
    }

    let name = normalize_name(last);
    if parent.contains(&name) {
        warn!(path = %path, "Skipping subtree, already installed in the image");
        report.warnings.push(MergeWarning::AlreadyInstalled(path));
        return MergeOutcome::Skipped;
    }

    parent.insert(&name, node);
    debug!(path = %path, "Attached subtree");
    report.attached.push(path);
    MergeOutcome::Attached
}

fn merge_into_root(root: &mut Folder, node: Node, report: &mut MergeReport) -> MergeOutcome {
    let folder = match node {
        Node::Folder(folder) => folder,
        Node::File(_) => {
            warn!("Skipping file subtree targeted at the volume root");
            report.warnings.push(MergeWarning::FileAtVolumeRoot);
            return MergeOutcome::Skipped;
        }
    };

    let mut attached = 0usize;
    let mut skipped = 0usize;
    for (name, child) in folder.into_children() {
        if root.contains(&name) {
            warn!(path = %name, "Skipping volume item, already installed in the image");
            report.warnings.push(MergeWarning::AlreadyInstalled(name));
            skipped += 1;
            continue;
        }
        root.insert(&name, child);
        report.attached.push(name);
        attached += 1;
    }

    match (attached, skipped) {
        (_, 0) => MergeOutcome::Attached,
        (0, _) => MergeOutcome::Skipped,
        _ => MergeOutcome::Partial,
    }
}

/// Merge subtrees in the order given
pub fn merge_all(root: &mut Folder, subtrees: impl IntoIterator<Item = Subtree>) -> MergeReport {
    let mut report = MergeReport::default();
    for subtree in subtrees {
        merge(root, subtree, &mut report);
    }
    report
}
