//! End-to-end tests for the build pipeline with fake collaborators

use infinite_hd::chunk::ImageReader;
use infinite_hd::error::{BuildError, ImportError};
use infinite_hd::import::{Generation, GenerationSet, ImportUnit, SourceKind, SourceLocator};
use infinite_hd::manifest::{read_manifest, ImageManifest};
use infinite_hd::pipeline::{BuildPipeline, BuildSummary, PipelineOptions, VolumeVariant};
use infinite_hd::store::{FsChunkStore, MemoryChunkStore};
use infinite_hd::tree::{ConflictPolicy, DestinationPath, MergeWarning};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

use super::test_utils::{collaborators, FailingDesktopDb};

const BASE: &[u8] = b"System Folder/;Read Me";

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let library = root.path().join("Library");
        fs::create_dir_all(library.join("Games")).unwrap();
        fs::create_dir_all(library.join("Graphics")).unwrap();
        fs::write(library.join("Games/Marathon.dsk"), b"Marathon/;Marathon Map").unwrap();
        fs::write(library.join("Graphics/Canvas.dsk"), b"Canvas/").unwrap();
        fs::write(library.join("Dupe.dsk"), b"Impostor/").unwrap();
        fs::create_dir_all(root.path().join("cache")).unwrap();
        Self { root }
    }

    fn library(&self) -> PathBuf {
        self.root.path().join("Library")
    }

    fn cache(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    fn manifest_dir(&self) -> PathBuf {
        self.root.path().join("Data")
    }

    fn options(&self, conflict_policy: ConflictPolicy) -> PipelineOptions {
        PipelineOptions {
            volumes: volumes(),
            chunk_size: 4096,
            manifest_dir: self.manifest_dir(),
            conflict_policy,
            image_dir: None,
        }
    }
}

fn legacy() -> GenerationSet {
    [Generation::NeedsLegacyMajorVersion].into_iter().collect()
}

fn volumes() -> Vec<VolumeVariant> {
    vec![
        VolumeVariant {
            name: "Test HD6".to_string(),
            generations: GenerationSet::baseline(),
            extends: None,
            size_bytes: 64 * 1024,
            block_alignment: 512,
            bootable: false,
        },
        VolumeVariant {
            name: "Test HD".to_string(),
            generations: [Generation::Baseline, Generation::NeedsLegacyMajorVersion]
                .into_iter()
                .collect(),
            extends: Some("Test HD6".to_string()),
            size_bytes: 128 * 1024,
            block_alignment: 512,
            bootable: false,
        },
    ]
}

fn raw(id: &str, file: &str) -> ImportUnit {
    ImportUnit::new(id, SourceLocator::Path(file.into()), SourceKind::RawImage)
}

/// Deliberately out of order; the pipeline sorts by id
fn units() -> Vec<ImportUnit> {
    vec![
        raw("Zzz/Dupe", "Dupe.dsk").with_destination(DestinationPath::parse("Games/Marathon")),
        raw("Graphics/Canvas", "Graphics/Canvas.dsk").with_generations(legacy()),
        raw("Games/Marathon", "Games/Marathon.dsk"),
    ]
}

fn listing(store: &FsChunkStore, manifest_path: &Path) -> String {
    let manifest = match read_manifest(manifest_path).unwrap() {
        ImageManifest::Content(manifest) => manifest,
        ImageManifest::Sequential(_) => panic!("expected a content manifest"),
    };
    let image = ImageReader::new(&manifest, store).unwrap().reconstruct().unwrap();
    let end = image.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
    String::from_utf8_lossy(&image[..end]).to_string()
}

fn run(workspace: &Workspace, store: &FsChunkStore, units: Vec<ImportUnit>) -> Result<BuildSummary, BuildError> {
    let collab = collaborators(&workspace.library(), &workspace.cache());
    BuildPipeline::new(&collab, store, workspace.options(ConflictPolicy::Skip)).run(units, BASE)
}

#[test]
fn test_builds_every_volume() {
    let workspace = Workspace::new();
    let store = FsChunkStore::new(workspace.root.path().join("store")).unwrap();
    let summary = run(&workspace, &store, units()).unwrap();

    assert!(summary.skipped.is_empty());
    assert!(summary.volumes.iter().all(|v| v.image_path.is_none()));
    assert_eq!(summary.volumes.len(), 2);
    let hd6 = &summary.volumes[0];
    let hd = &summary.volumes[1];

    assert_eq!(hd6.units, vec!["Games/Marathon", "Zzz/Dupe"]);
    assert_eq!(hd.units, vec!["Games/Marathon", "Zzz/Dupe", "Graphics/Canvas"]);
    assert_eq!(
        hd6.merge.warnings,
        vec![MergeWarning::AlreadyInstalled("Games/Marathon".to_string())]
    );
    assert_eq!(hd.merge.attached, vec!["Graphics/Canvas".to_string()]);
    assert_ne!(hd6.fingerprint, hd.fingerprint);

    assert_eq!(
        hd6.image.manifest_path,
        workspace.manifest_dir().join("Test HD6.dsk.json")
    );
    assert_eq!(hd6.image.manifest.total_size, 64 * 1024);
    assert_eq!(hd.image.manifest.total_size, 128 * 1024);

    let text = listing(&store, &hd6.image.manifest_path);
    assert!(text.starts_with("System Folder\n"));
    assert!(text.contains("Games:Marathon:Marathon:contents\nMarathon"));
    assert!(!text.contains("Impostor"));
    assert!(!text.contains("Canvas"));
}

/// A child volume contains its parent's whole tree, in the same order
#[test]
fn test_images_kept_when_image_dir_set() {
    let workspace = Workspace::new();
    let store = MemoryChunkStore::new();
    let collab = collaborators(&workspace.library(), &workspace.cache());
    let mut options = workspace.options(ConflictPolicy::Skip);
    let image_dir = workspace.root.path().join("Images/out");
    options.image_dir = Some(image_dir.clone());

    let summary = BuildPipeline::new(&collab, &store, options)
        .run(units(), BASE)
        .unwrap();
    let hd = &summary.volumes[1];
    assert_eq!(hd.image_path, Some(image_dir.join("Test HD.dsk")));
    let image = fs::read(image_dir.join("Test HD.dsk")).unwrap();
    assert_eq!(image.len() as u64, hd.image.manifest.total_size);
}

#[test]
fn test_child_volume_extends_parent() {
    let workspace = Workspace::new();
    let store = FsChunkStore::new(workspace.root.path().join("store")).unwrap();
    let summary = run(&workspace, &store, units()).unwrap();

    let parent = listing(&store, &summary.volumes[0].image.manifest_path);
    let child = listing(&store, &summary.volumes[1].image.manifest_path);
    assert!(child.starts_with(&parent));
    assert!(child[parent.len()..].starts_with("Graphics\n"));
}

#[test]
fn test_rebuild_is_reproducible() {
    let workspace = Workspace::new();
    let store = FsChunkStore::new(workspace.root.path().join("store")).unwrap();
    let first = run(&workspace, &store, units()).unwrap();
    let second = run(&workspace, &store, units()).unwrap();

    for (a, b) in first.volumes.iter().zip(&second.volumes) {
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.image.manifest, b.image.manifest);
        assert_eq!(b.image.stats.stored_chunks, 0);
    }
}

#[test]
fn test_missing_source_skipped() {
    let workspace = Workspace::new();
    let store = FsChunkStore::new(workspace.root.path().join("store")).unwrap();
    let mut units = units();
    units.push(raw("Apps/Gone", "Apps/Gone.dsk"));

    let summary = run(&workspace, &store, units).unwrap();
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].id, "Apps/Gone");
    assert!(summary.volumes.iter().all(|v| !v.units.contains(&"Apps/Gone".to_string())));
}

#[test]
fn test_required_source_aborts() {
    let workspace = Workspace::new();
    let store = FsChunkStore::new(workspace.root.path().join("store")).unwrap();
    let mut units = units();
    units.push(raw("Apps/Gone", "Apps/Gone.dsk").required(true));

    let result = run(&workspace, &store, units);
    match result {
        Err(BuildError::RequiredUnitFailed { unit, source }) => {
            assert_eq!(unit, "Apps/Gone");
            assert!(matches!(source, ImportError::SourceResolution { .. }));
        }
        other => panic!("expected RequiredUnitFailed, got {:?}", other.map(|_| ())),
    }
    assert!(!workspace.manifest_dir().exists());
}

#[test]
fn test_fail_policy_turns_conflict_into_error() {
    let workspace = Workspace::new();
    let store = MemoryChunkStore::new();
    let collab = collaborators(&workspace.library(), &workspace.cache());
    let result = BuildPipeline::new(&collab, &store, workspace.options(ConflictPolicy::Fail))
        .run(units(), BASE);

    match result {
        Err(BuildError::MergeConflict(message)) => {
            assert!(message.contains("Zzz/Dupe"));
            assert!(message.contains("Test HD6"));
        }
        other => panic!("expected MergeConflict, got {:?}", other.map(|_| ())),
    }
    assert!(store.is_empty());
}

#[test]
fn test_desktop_db_failure_is_not_fatal() {
    let workspace = Workspace::new();
    let store = MemoryChunkStore::new();
    let rebuilder = FailingDesktopDb::default();
    let mut collab = collaborators(&workspace.library(), &workspace.cache());
    collab.desktop_db = Some(Box::new(rebuilder.clone()));

    let summary = BuildPipeline::new(&collab, &store, workspace.options(ConflictPolicy::Skip))
        .run(units(), BASE)
        .unwrap();
    assert_eq!(summary.volumes.len(), 2);
    assert_eq!(rebuilder.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_serializer_failure_names_volume() {
    let workspace = Workspace::new();
    let store = MemoryChunkStore::new();
    let collab = collaborators(&workspace.library(), &workspace.cache());
    let mut options = workspace.options(ConflictPolicy::Skip);
    options.volumes[0].size_bytes = 8;

    let result = BuildPipeline::new(&collab, &store, options).run(units(), BASE);
    match result {
        Err(BuildError::Serialization { volume, .. }) => assert_eq!(volume, "Test HD6"),
        other => panic!("expected Serialization, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_undefined_parent_volume_rejected() {
    let workspace = Workspace::new();
    let store = MemoryChunkStore::new();
    let collab = collaborators(&workspace.library(), &workspace.cache());
    let mut options = workspace.options(ConflictPolicy::Skip);
    options.volumes.reverse();

    let result = BuildPipeline::new(&collab, &store, options).run(units(), BASE);
    assert!(matches!(result, Err(BuildError::ConfigError(_))));
}
