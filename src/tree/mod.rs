//! Folder Tree
//!
//! In-memory model of a legacy volume's folder hierarchy, plus the operations
//! that build it from extracted sources and fold imported subtrees into a
//! destination volume.

pub mod hasher;
pub mod merge;
pub mod name;
pub mod node;
pub mod prepackaged;
pub mod walker;

pub use merge::{merge, merge_all, ConflictPolicy, DestinationPath, MergeOutcome, MergeReport, MergeWarning, Subtree};
pub use name::normalize_name;
pub use node::{File, Folder, Node};
