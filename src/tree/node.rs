//! Node types for the folder tree

use crate::finder::{FileInfo, FolderInfo, Timestamps};
use crate::tree::name::normalize_name;
use indexmap::IndexMap;

/// A file or folder in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    File(File),
    Folder(Folder),
}

impl Node {
    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(folder) => Some(folder),
            Node::File(_) => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut Folder> {
        match self {
            Node::Folder(folder) => Some(folder),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(file) => Some(file),
            Node::Folder(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    pub fn timestamps(&self) -> Timestamps {
        match self {
            Node::File(file) => file.dates,
            Node::Folder(folder) => folder.dates,
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Folder> for Node {
    fn from(folder: Folder) -> Self {
        Node::Folder(folder)
    }
}

/// File node: both forks plus Finder info
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    pub data: Vec<u8>,
    pub resource_fork: Vec<u8>,
    pub info: FileInfo,
    pub dates: Timestamps,
}

impl File {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }
}

/// Folder node
///
/// Children are keyed by normalized name and keep insertion order; every
/// accessor normalizes the name it is given.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Folder {
    children: IndexMap<String, Node>,
    pub info: FolderInfo,
    /// Extended folder info (DXInfo), carried opaquely
    pub extra_info: [u8; 16],
    pub dates: Timestamps,
}

impl Folder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(info: FolderInfo) -> Self {
        Self {
            info,
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(&normalize_name(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(&normalize_name(name))
    }

    /// Insert a child, returning the node previously stored under that name
    pub fn insert(&mut self, name: &str, node: impl Into<Node>) -> Option<Node> {
        self.children.insert(normalize_name(name), node.into())
    }

    /// Remove a child, keeping the order of the remaining children
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.shift_remove(&normalize_name(name))
    }

    /// Child folder `name`, created with default metadata when absent.
    ///
    /// Returns `None` when a file already occupies the name.
    pub fn folder_entry(&mut self, name: &str) -> Option<&mut Folder> {
        self.children
            .entry(normalize_name(name))
            .or_insert_with(|| Node::Folder(Folder::new()))
            .as_folder_mut()
    }

    /// Iterate children in insertion order
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn into_children(self) -> impl Iterator<Item = (String, Node)> {
        self.children.into_iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.children.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Look up a descendant by `/`-separated path of raw names
    pub fn lookup(&self, path: &[&str]) -> Option<&Node> {
        let (last, parents) = path.split_last()?;
        let mut folder = self;
        for segment in parents {
            folder = folder.get(segment)?.as_folder()?;
        }
        folder.get(last)
    }

    /// Total number of nodes below this folder
    pub fn descendant_count(&self) -> usize {
        self.children
            .values()
            .map(|child| match child {
                Node::File(_) => 1,
                Node::Folder(folder) => 1 + folder.descendant_count(),
            })
            .sum()
    }
}
