//! Integration tests for scanning a library and resolving its units

use infinite_hd::finder::{OsType, AUTO_ARRANGE_POSITION};
use infinite_hd::import::{
    scan_library, Generation, GenerationSet, LocalFetcher, Resolver, SourceKind,
};
use infinite_hd::pipeline::{plan_volumes, VolumeVariant};
use infinite_hd::tree::{Folder, Node};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

use super::test_utils::import_collaborators;

const CHESS_URL: &str = "https://example.com/files/Chess.dsk";

fn finder_info(file_type: &[u8; 4], creator: &[u8; 4]) -> Vec<u8> {
    let mut info = vec![0u8; 32];
    info[0..4].copy_from_slice(file_type);
    info[4..8].copy_from_slice(creator);
    info[8..10].copy_from_slice(&0x2000u16.to_be_bytes());
    info
}

fn folder_info(view: u16) -> Vec<u8> {
    let mut info = vec![0u8; 32];
    info[14..16].copy_from_slice(&view.to_be_bytes());
    info
}

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

/// Write a `.zip` bundle; entries ending in `/` are directories
fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = ZipWriter::new(fs::File::create(path).unwrap());
    let options: FileOptions<'_, ()> = FileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// A library with a disk-image manifest, a folder-only manifest, a URL
/// manifest and a prepackaged bundle
fn library(root: &Path, cache: &Path) {
    write(
        &root.join("Games/Arcade.json"),
        br#"{"src_path": "images/Arcade.dsk", "needs_system_7": true}"#,
    );
    write(&root.join("images/Arcade.dsk"), b"Arcade/");
    write(
        &root.join("Apps/Utilities.json"),
        br#"{"src_path": "images/Utils.img", "src_folder": "Tools"}"#,
    );
    write(&root.join("images/Utils.img"), b"Tools/;Junk");
    write(
        &root.join("Games/Chess.json"),
        format!(r#"{{"src_url": "{}"}}"#, CHESS_URL).as_bytes(),
    );
    write(&LocalFetcher::new(root, cache).cache_path(CHESS_URL), b"Chess/");

    write_bundle(
        &root.join("Graphics/Paint.zip"),
        &[
            ("Paint/", b""),
            ("Paint/Samples/", b""),
            (".finf/Paint", &folder_info(0x0100)),
            ("Paint/Samples/Tree", b"pict"),
            ("Paint/Paint App", b"data fork"),
            ("Paint/.rsrc/Paint App", b"resource fork"),
            ("Paint/.finf/Paint App", &finder_info(b"APPL", b"PANT")),
        ],
    );
}

fn prepackaged_generations() -> HashMap<String, GenerationSet> {
    let mut routing = HashMap::new();
    routing.insert(
        "Graphics/Paint".to_string(),
        [Generation::NeedsLegacyMajorVersion].into_iter().collect(),
    );
    routing
}

fn folder(node: &Node) -> &Folder {
    node.as_folder().expect("folder")
}

#[test]
fn test_scan_and_resolve_library() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("Library");
    let cache = temp_dir.path().join("cache");
    library(&root, &cache);

    let units = scan_library(&root, None, &prepackaged_generations()).unwrap();
    let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["Apps/Utilities", "Games/Arcade", "Games/Chess", "Graphics/Paint"]
    );
    assert_eq!(units[3].kind, SourceKind::Prepackaged);

    let collab = import_collaborators(&root, &cache);
    let results = Resolver::new(&collab).resolve_all(&units);
    let subtrees: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    // src_folder: only the named folder, set to auto-arrange
    let tools = folder(&subtrees[0].root);
    assert_eq!(tools.names(), vec!["contents"]);
    assert_eq!(tools.info.position, AUTO_ARRANGE_POSITION);

    // whole volume from the URL cache
    assert_eq!(folder(&subtrees[2].root).names(), vec!["Chess"]);

    // prepackaged bundle with both forks and Finder info
    let paint = folder(&subtrees[3].root);
    let app = paint.lookup(&["Paint", "Paint App"]).unwrap().as_file().unwrap();
    assert_eq!(app.data, b"data fork");
    assert_eq!(app.resource_fork, b"resource fork");
    assert_eq!(app.info.file_type, OsType(*b"APPL"));
    assert_eq!(app.info.creator, OsType(*b"PANT"));
    assert!(app.info.flags & 0x2000 != 0);

    // explicit folder with its own Finder info, children in bundle order
    let paint_folder = folder(paint.get("Paint").unwrap());
    assert_eq!(paint_folder.info.view, 0x0100);
    assert_eq!(paint_folder.names(), vec!["Samples", "Paint App"]);
}

#[test]
fn test_generations_route_units_to_volumes() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("Library");
    let cache = temp_dir.path().join("cache");
    library(&root, &cache);

    let units = scan_library(&root, None, &prepackaged_generations()).unwrap();
    let plans = plan_volumes(&VolumeVariant::defaults(), &units);

    assert_eq!(plans[0].units, vec!["Apps/Utilities", "Games/Chess"]);
    assert_eq!(
        plans[1].units,
        vec!["Apps/Utilities", "Games/Chess", "Games/Arcade", "Graphics/Paint"]
    );
    assert!(plans[2].units.is_empty());
}

#[test]
fn test_modern_units_reach_the_mac_os_x_volume() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("Library");
    write(
        &root.join("Apps/Browser.json"),
        br#"{"src_path": "images/Browser.dsk", "needs_mac_os_x": true}"#,
    );
    write(
        &root.join("Apps/Office.json"),
        br#"{"src_path": "images/Office.dsk", "carbonized": true}"#,
    );
    write(
        &root.join("Apps/Writer.json"),
        br#"{"src_path": "images/Writer.dsk"}"#,
    );

    let units = scan_library(&root, None, &HashMap::new()).unwrap();
    let plans = plan_volumes(&VolumeVariant::defaults(), &units);

    assert_eq!(plans[0].units, vec!["Apps/Writer"]);
    assert_eq!(plans[1].units, vec!["Apps/Writer", "Apps/Office"]);
    assert_eq!(plans[2].units, vec!["Apps/Browser", "Apps/Office"]);
}

#[test]
fn test_missing_named_folder_fails_unit() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("Library");
    let cache = temp_dir.path().join("cache");
    write(
        &root.join("Apps/Missing.json"),
        br#"{"src_path": "images/Utils.img", "src_folder": "Nope"}"#,
    );
    write(&root.join("images/Utils.img"), b"Tools/");

    let units = scan_library(&root, None, &HashMap::new()).unwrap();
    let collab = import_collaborators(&root, &cache);
    let result = Resolver::new(&collab).resolve(&units[0]);
    assert!(matches!(
        result,
        Err(infinite_hd::error::ImportError::ArchiveExtraction { .. })
    ));
}
