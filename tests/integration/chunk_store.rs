//! Integration tests for chunking into the on-disk store

use infinite_hd::chunk::{Chunker, ImageReader, DEFAULT_CHUNK_SIZE};
use infinite_hd::manifest::{read_manifest, ChunkRef, ImageManifest};
use infinite_hd::pipeline::write_content_manifest;
use infinite_hd::store::{ChunkStore, FsChunkStore};
use std::fs;
use tempfile::TempDir;

const HALF: usize = 256 * 1024;

fn two_halves() -> Vec<u8> {
    let mut image = vec![0x11u8; HALF];
    image.extend(std::iter::repeat(0x22u8).take(HALF));
    image
}

fn chunk_files(store: &FsChunkStore) -> usize {
    fs::read_dir(store.root()).unwrap().count()
}

/// Two distinct non-zero 256 KiB halves give two digests and two files
#[test]
fn test_reconstruction_law() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsChunkStore::new(temp_dir.path().join("store")).unwrap();
    let image = two_halves();

    let (manifest, stats) = Chunker::new(&store, DEFAULT_CHUNK_SIZE)
        .chunk_image("Halves", &image)
        .unwrap();

    assert_eq!(manifest.chunks.len(), 2);
    assert_ne!(manifest.chunks[0], manifest.chunks[1]);
    assert!(manifest.chunks.iter().all(|c| c.digest().is_some()));
    assert_eq!(stats.stored_chunks, 2);
    assert_eq!(chunk_files(&store), 2);

    let mut rebuilt = Vec::new();
    for chunk in &manifest.chunks {
        rebuilt.extend(store.read(chunk.digest().unwrap()).unwrap());
    }
    assert_eq!(rebuilt, image);
}

#[test]
fn test_zero_chunks_never_stored() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsChunkStore::new(temp_dir.path().join("store")).unwrap();
    let mut image = vec![0u8; 3 * HALF];
    image[HALF..HALF + 4].copy_from_slice(b"boot");

    let (manifest, stats) = Chunker::new(&store, DEFAULT_CHUNK_SIZE)
        .chunk_image("Sparse", &image)
        .unwrap();

    assert_eq!(manifest.chunks[0], ChunkRef::Zero);
    assert_eq!(manifest.chunks[2], ChunkRef::Zero);
    assert_eq!(stats.zero_chunks, 2);
    assert_eq!(chunk_files(&store), 1);

    let reader = ImageReader::new(&manifest, &store).unwrap();
    assert_eq!(reader.reconstruct().unwrap(), image);
}

/// Chunking the same image again yields the same manifest and writes nothing
#[test]
fn test_rechunking_is_deterministic_and_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsChunkStore::new(temp_dir.path().join("store")).unwrap();
    let chunker = Chunker::new(&store, DEFAULT_CHUNK_SIZE);
    let image = two_halves();

    let (first, _) = chunker.chunk_image("Halves", &image).unwrap();
    let (second, stats) = chunker.chunk_image("Halves", &image).unwrap();

    assert_eq!(first, second);
    assert_eq!(stats.stored_chunks, 0);
    assert_eq!(stats.deduplicated_chunks, 2);
    assert_eq!(chunk_files(&store), 2);
}

/// Images sharing a chunk share the stored file
#[test]
fn test_store_shared_across_images() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsChunkStore::new(temp_dir.path().join("store")).unwrap();
    let chunker = Chunker::new(&store, DEFAULT_CHUNK_SIZE);

    let mut other = vec![0x11u8; HALF];
    other.extend(std::iter::repeat(0x33u8).take(HALF));
    chunker.chunk_image("A", &two_halves()).unwrap();
    let (_, stats) = chunker.chunk_image("B", &other).unwrap();

    assert_eq!(stats.stored_chunks, 1);
    assert_eq!(stats.deduplicated_chunks, 1);
    assert_eq!(store.digests().unwrap().len(), 3);
    assert_eq!(store.clear().unwrap(), 3);
    assert!(store.digests().unwrap().is_empty());
}

#[test]
fn test_manifest_file_shape() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsChunkStore::new(temp_dir.path().join("store")).unwrap();
    let mut image = vec![0u8; HALF];
    image.extend(std::iter::repeat(0x44u8).take(100));

    let (manifest, _) = Chunker::new(&store, DEFAULT_CHUNK_SIZE)
        .chunk_image("Tail", &image)
        .unwrap();
    let path = write_content_manifest(&temp_dir.path().join("Data"), "Tail.dsk", &manifest).unwrap();
    assert!(path.ends_with("Data/Tail.dsk.json"));

    let text = fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["name"], "Tail");
    assert_eq!(value["totalSize"], (HALF + 100) as u64);
    assert_eq!(value["chunkSize"], DEFAULT_CHUNK_SIZE as u64);
    assert_eq!(value["chunks"][0], "");
    assert_eq!(value["chunks"][1].as_str().unwrap().len(), 32);
    assert!(text.contains("\n    \"name\""));

    let name_at = text.find("\"name\"").unwrap();
    let chunks_at = text.find("\"chunks\"").unwrap();
    let size_at = text.find("\"chunkSize\"").unwrap();
    assert!(name_at < chunks_at && chunks_at < size_at);

    match read_manifest(&path).unwrap() {
        ImageManifest::Content(read) => assert_eq!(read, manifest),
        ImageManifest::Sequential(_) => panic!("expected a content manifest"),
    }

    // The trailing 100 bytes are stored at their real length
    let tail = manifest.chunks[1].digest().unwrap();
    assert_eq!(store.read(tail).unwrap().len(), 100);
}
