//! Finder record and timestamp properties

use chrono::{DateTime, TimeZone, Utc};
use infinite_hd::finder::date::to_legacy_seconds;
use infinite_hd::finder::{convert_date_at, FileInfo, FolderInfo, LEGACY_EPOCH_OFFSET};
use proptest::prelude::*;

proptest! {
    /// Any 16 bytes decode to a DInfo that encodes back to the same bytes
    #[test]
    fn folder_info_is_byte_exact(bytes in any::<[u8; 16]>()) {
        let info = FolderInfo::decode(&bytes).unwrap();
        prop_assert_eq!(info.encode(), bytes);
    }

    /// Any 32 bytes decode to an FInfo + FXInfo that encodes back to the same bytes
    #[test]
    fn file_info_is_byte_exact(bytes in prop::collection::vec(any::<u8>(), 32)) {
        let info = FileInfo::decode(&bytes).unwrap();
        prop_assert_eq!(info.encode().to_vec(), bytes);
    }

    #[test]
    fn wrong_lengths_rejected(len in (0usize..64).prop_filter("not a record length", |l| *l != 16 && *l != 32)) {
        let bytes = vec![0u8; len];
        prop_assert!(FolderInfo::decode(&bytes).is_err());
        prop_assert!(FileInfo::decode(&bytes).is_err());
    }

    /// Past timestamps shift by the epoch offset; future ones clamp to now
    #[test]
    fn dates_clamped_to_now(unix in 0i64..4_000_000_000, now in 0i64..2_000_000_000) {
        let now: DateTime<Utc> = Utc.timestamp_opt(now, 0).unwrap();
        let stamp = Utc.timestamp_opt(unix, 0).unwrap();
        let text = stamp.format("%Y-%m-%d %H:%M:%S +0000").to_string();

        let converted = convert_date_at(&text, now).unwrap() as i64;
        let expected = unix.min(now.timestamp()) + LEGACY_EPOCH_OFFSET;
        prop_assert_eq!(converted, expected);
    }
}

#[test]
fn test_epoch_boundaries() {
    assert_eq!(to_legacy_seconds(0).unwrap(), 2_082_844_800);
    assert!(to_legacy_seconds(u32::MAX as i64).is_err());
}
