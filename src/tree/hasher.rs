//! Tree fingerprints using BLAKE3
//!
//! A fingerprint covers names, insertion order, both forks and the encoded
//! Finder metadata of every node, so two trees share a fingerprint only when
//! they would serialize to the same volume contents.

use crate::finder::Timestamps;
use crate::tree::node::{File, Folder, Node};
use blake3::Hasher;

/// 32-byte tree fingerprint
pub type Fingerprint = [u8; 32];

/// Compute the content hash of a fork
pub fn compute_content_hash(content: &[u8]) -> Fingerprint {
    *blake3::hash(content).as_bytes()
}

/// Fingerprint = hash("file" || data_hash || rsrc_hash || finfo || dates)
pub fn fingerprint_file(file: &File) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(b"file");
    hasher.update(&compute_content_hash(&file.data));
    hasher.update(&compute_content_hash(&file.resource_fork));
    hasher.update(&file.info.encode());
    hash_dates(&mut hasher, &file.dates);
    *hasher.finalize().as_bytes()
}

/// Fingerprint = hash("folder" || dinfo || dxinfo || dates || child_count || (name_len || name || child)*)
///
/// Children are hashed in insertion order, which is the order the
/// serializer lays them out in.
pub fn fingerprint_folder(folder: &Folder) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(b"folder");
    hasher.update(&folder.info.encode());
    hasher.update(&folder.extra_info);
    hash_dates(&mut hasher, &folder.dates);
    hasher.update(&(folder.len() as u64).to_be_bytes());
    for (name, child) in folder.children() {
        hasher.update(&(name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update(&fingerprint(child));
    }
    *hasher.finalize().as_bytes()
}

pub fn fingerprint(node: &Node) -> Fingerprint {
    match node {
        Node::File(file) => fingerprint_file(file),
        Node::Folder(folder) => fingerprint_folder(folder),
    }
}

fn hash_dates(hasher: &mut Hasher, dates: &Timestamps) {
    hasher.update(&dates.created.to_be_bytes());
    hasher.update(&dates.modified.to_be_bytes());
}
