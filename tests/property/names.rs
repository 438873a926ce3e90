//! Name normalization properties

use infinite_hd::tree::name::MAX_NAME_LEN;
use infinite_hd::tree::normalize_name;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_names_fit_the_volume(name in "\\PC{0,64}") {
        let normalized = normalize_name(&name);
        prop_assert!(normalized.len() <= MAX_NAME_LEN);
        prop_assert!(!normalized.contains(':'));
    }

    #[test]
    fn normalization_is_idempotent(name in "[a-zA-Z0-9 :éüñ\u{0301}]{0,48}") {
        let once = normalize_name(&name);
        prop_assert_eq!(normalize_name(&once), once.clone());
    }

    /// Short ASCII names only change their separators
    #[test]
    fn short_ascii_names_keep_their_text(name in "[ -~]{0,31}") {
        prop_assert_eq!(normalize_name(&name), name.replace(':', "/"));
    }
}

#[test]
fn test_multibyte_truncation_keeps_whole_characters() {
    let name = "é".repeat(20);
    let normalized = normalize_name(&name);
    assert_eq!(normalized.len(), 30);
    assert_eq!(normalized.chars().count(), 15);
}
