//! Merge determinism over arbitrary subtree lists

use infinite_hd::tree::hasher::fingerprint_folder;
use infinite_hd::tree::{merge_all, DestinationPath, File, Folder, Subtree};
use proptest::prelude::*;

fn subtree_strategy() -> impl Strategy<Value = Subtree> {
    (
        prop::collection::vec("[A-C]", 0..3),
        prop::collection::vec(any::<u8>(), 0..8),
        any::<bool>(),
    )
        .prop_map(|(segments, data, as_folder)| {
            let destination = DestinationPath::parse(&segments.join("/"));
            if as_folder || destination.is_root() {
                let mut folder = Folder::new();
                folder.insert("Item", File::new(data));
                Subtree::new(destination, folder)
            } else {
                Subtree::new(destination, File::new(data))
            }
        })
}

proptest! {
    #[test]
    fn merge_is_reproducible(subtrees in prop::collection::vec(subtree_strategy(), 0..12)) {
        let mut first = Folder::new();
        let mut second = Folder::new();
        let report_a = merge_all(&mut first, subtrees.clone());
        let report_b = merge_all(&mut second, subtrees.clone());

        prop_assert_eq!(fingerprint_folder(&first), fingerprint_folder(&second));
        prop_assert_eq!(report_a.warnings, report_b.warnings);

        // A second pass over a merged tree attaches nothing new
        let before = fingerprint_folder(&first);
        let again = merge_all(&mut first, subtrees);
        prop_assert!(again.attached.is_empty());
        prop_assert_eq!(fingerprint_folder(&first), before);
    }
}
