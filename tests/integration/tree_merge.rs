//! Integration tests for merging imported subtrees into a volume tree

use infinite_hd::finder::FolderInfo;
use infinite_hd::tree::hasher::fingerprint_folder;
use infinite_hd::tree::{
    merge, merge_all, DestinationPath, File, Folder, MergeOutcome, MergeReport, MergeWarning,
    Node, Subtree,
};

use super::test_utils::paths;

fn folder_with(name: &str, data: &[u8]) -> Folder {
    let mut folder = Folder::new();
    folder.insert(name, File::new(data.to_vec()));
    folder
}

fn base() -> Folder {
    let mut root = Folder::new();
    root.insert("System Folder", folder_with("System", b"sys"));
    root.insert("Games", Folder::new());
    root
}

fn subtrees() -> Vec<Subtree> {
    vec![
        Subtree::new(DestinationPath::parse("Games/Chess"), folder_with("Chess", b"first")),
        Subtree::new(DestinationPath::parse("Games/Chess"), folder_with("Chess", b"second")),
        Subtree::new(DestinationPath::parse("Graphics/Paint"), folder_with("Paint", b"paint")),
        Subtree::new(DestinationPath::root(), folder_with("System Folder", b"replacement")),
    ]
}

#[test]
fn test_first_subtree_wins() {
    let mut root = base();
    let report = merge_all(&mut root, subtrees().into_iter().take(2));

    let chess = root.lookup(&["Games", "Chess", "Chess"]).unwrap();
    assert_eq!(chess.as_file().unwrap().data, b"first");
    assert_eq!(
        report.warnings,
        vec![MergeWarning::AlreadyInstalled("Games/Chess".to_string())]
    );
    assert!(report.has_conflicts());
}

#[test]
fn test_merge_is_deterministic() {
    let mut first = base();
    let mut second = base();
    let report_a = merge_all(&mut first, subtrees());
    let report_b = merge_all(&mut second, subtrees());

    assert_eq!(first, second);
    assert_eq!(fingerprint_folder(&first), fingerprint_folder(&second));
    assert_eq!(report_a.warnings, report_b.warnings);
    assert_eq!(report_a.attached, report_b.attached);
}

#[test]
fn test_remerging_changes_nothing() {
    let mut root = base();
    merge_all(&mut root, subtrees());
    let before = fingerprint_folder(&root);

    let report = merge_all(&mut root, subtrees());
    assert!(report.attached.is_empty());
    assert_eq!(fingerprint_folder(&root), before);
}

#[test]
fn test_intermediate_folders_created_in_order() {
    let mut root = base();
    merge_all(&mut root, subtrees());
    assert_eq!(
        paths(&root),
        vec![
            "System Folder",
            "System Folder:System",
            "Games",
            "Games:Chess",
            "Games:Chess:Chess",
            "Graphics",
            "Graphics:Paint",
            "Graphics:Paint:Paint",
        ]
    );
}

#[test]
fn test_root_merge_skips_existing_children_only() {
    let mut root = base();
    let mut volume = folder_with("System Folder", b"replacement");
    volume.insert("Read Me", File::new(b"hello".to_vec()));
    let mut report = MergeReport::default();

    let outcome = merge(&mut root, Subtree::new(DestinationPath::root(), volume), &mut report);

    assert_eq!(outcome, MergeOutcome::Partial);
    assert!(root.contains("Read Me"));
    let system = root.lookup(&["System Folder", "System"]).unwrap();
    assert_eq!(system.as_file().unwrap().data, b"sys");
}

#[test]
fn test_file_blocks_destination() {
    let mut root = Folder::new();
    root.insert("Games", File::new(b"not a folder".to_vec()));
    let mut report = MergeReport::default();

    let outcome = merge(
        &mut root,
        Subtree::new(DestinationPath::parse("Games/Chess"), Folder::new()),
        &mut report,
    );
    assert_eq!(outcome, MergeOutcome::Skipped);
    assert_eq!(
        report.warnings,
        vec![MergeWarning::BlockedByFile("Games/Chess".to_string())]
    );
}

#[test]
fn test_colon_names_stay_single_segment() {
    let mut root = Folder::new();
    merge_all(
        &mut root,
        vec![Subtree::new(DestinationPath::parse("Apps/Foo:Bar"), Folder::new())],
    );
    let apps = root.get("Apps").and_then(Node::as_folder).unwrap();
    assert_eq!(apps.names(), vec!["Foo/Bar"]);
    assert_eq!(apps.names()[0].len(), 7);
}

#[test]
fn test_long_names_truncated_on_merge() {
    let mut root = Folder::new();
    let long = "A Very Long Application Name That Overflows";
    merge_all(
        &mut root,
        vec![Subtree::new(DestinationPath::parse(long), Folder::new())],
    );
    assert_eq!(root.names(), vec![&long[..31]]);
}

#[test]
fn test_subtree_metadata_preserved() {
    let mut info = FolderInfo::default();
    info.request_auto_arrange();
    let mut root = Folder::new();
    merge_all(
        &mut root,
        vec![Subtree::new(DestinationPath::parse("Utilities"), Folder::with_info(info))],
    );
    let folder = root.get("Utilities").and_then(Node::as_folder).unwrap();
    assert_eq!(folder.info, info);
}
