//! Finder Metadata Codec
//!
//! Bit-exact conversion between node metadata and the fixed-width big-endian
//! structures the legacy Finder keeps for every file (FInfo + FXInfo) and
//! folder (DInfo).

pub mod date;
pub mod entry;
pub mod info;

pub use date::{convert_date, convert_date_at, LEGACY_EPOCH_OFFSET};
pub use entry::EntryMetadata;
pub use info::{FileInfo, FolderInfo, OsType, Point, Rect};

/// Size of an encoded DInfo record
pub const FOLDER_INFO_LEN: usize = 16;

/// Size of an encoded FInfo record followed by its 16 extended bytes
pub const FILE_INFO_LEN: usize = 32;

/// View mode the Finder uses for a folder with no recorded view (icon view)
pub const DEFAULT_FOLDER_VIEW: u16 = 0x127;

/// Icon position that asks the Finder to lay the item out itself
pub const AUTO_ARRANGE_POSITION: Point = Point { x: -1, y: -1 };

/// Finder flag bits
pub mod flags {
    pub const IS_ON_DESK: u16 = 0x0001;
    pub const COLOR: u16 = 0x000e;
    pub const IS_SHARED: u16 = 0x0040;
    pub const HAS_BEEN_INITED: u16 = 0x0100;
    pub const HAS_CUSTOM_ICON: u16 = 0x0400;
    pub const IS_STATIONERY: u16 = 0x0800;
    pub const NAME_LOCKED: u16 = 0x1000;
    pub const HAS_BUNDLE: u16 = 0x2000;
    pub const IS_INVISIBLE: u16 = 0x4000;
    pub const IS_ALIAS: u16 = 0x8000;

    const NAMED: [(&str, u16); 10] = [
        ("kIsOnDesk", IS_ON_DESK),
        ("kColor", COLOR),
        ("kIsShared", IS_SHARED),
        ("kHasBeenInited", HAS_BEEN_INITED),
        ("kHasCustomIcon", HAS_CUSTOM_ICON),
        ("kIsStationery", IS_STATIONERY),
        ("kNameLocked", NAME_LOCKED),
        ("kHasBundle", HAS_BUNDLE),
        ("kIsInvisible", IS_INVISIBLE),
        ("kIsAlias", IS_ALIAS),
    ];

    /// Names of the flags set in `value`, for diagnostics
    pub fn describe(value: u16) -> Vec<&'static str> {
        NAMED
            .iter()
            .filter(|(_, bit)| value & bit != 0)
            .map(|(name, _)| *name)
            .collect()
    }

}

/// Creation and modification times, in seconds since 1904-01-01 00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Timestamps {
    pub created: u32,
    pub modified: u32,
}
