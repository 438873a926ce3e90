//! Finder metadata reported by the archive extractor for one entry
//!
//! The extractor lists every file and folder of an archive with a set of
//! optional `XAD*` attributes. Anything it does not report falls back to the
//! defaults the Finder would expect for a freshly copied item.

use super::date::convert_date_at;
use super::info::{FileInfo, FolderInfo, OsType, Point, Rect};
use super::{flags, Timestamps, DEFAULT_FOLDER_VIEW};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(rename = "XADFileName", default)]
    pub file_name: Option<String>,
    #[serde(rename = "XADFileType", default)]
    pub file_type: Option<u32>,
    #[serde(rename = "XADFileCreator", default)]
    pub file_creator: Option<u32>,
    #[serde(rename = "XADFinderFlags", default)]
    pub finder_flags: Option<u16>,
    #[serde(rename = "XADFinderLocationX", default)]
    pub location_x: Option<i16>,
    #[serde(rename = "XADFinderLocationY", default)]
    pub location_y: Option<i16>,
    #[serde(rename = "XADFinderWindowTop", default)]
    pub window_top: Option<i16>,
    #[serde(rename = "XADFinderWindowLeft", default)]
    pub window_left: Option<i16>,
    #[serde(rename = "XADFinderWindowBottom", default)]
    pub window_bottom: Option<i16>,
    #[serde(rename = "XADFinderWindowRight", default)]
    pub window_right: Option<i16>,
    #[serde(rename = "XADFinderWindowView", default)]
    pub window_view: Option<u16>,
    #[serde(rename = "XADCreationDate", default)]
    pub creation_date: Option<String>,
    #[serde(rename = "XADLastModificationDate", default)]
    pub modification_date: Option<String>,
}

impl EntryMetadata {
    fn position(&self) -> Option<Point> {
        match (self.location_x, self.location_y) {
            (Some(x), Some(y)) => Some(Point { x, y }),
            _ => None,
        }
    }

    fn window_rect(&self) -> Option<Rect> {
        match (
            self.window_top,
            self.window_left,
            self.window_bottom,
            self.window_right,
        ) {
            (Some(top), Some(left), Some(bottom), Some(right)) => Some(Rect {
                top,
                left,
                bottom,
                right,
            }),
            _ => None,
        }
    }

    /// FInfo for a file, with defaults for anything the extractor omitted
    pub fn file_info(&self) -> FileInfo {
        let mut info = FileInfo::default();
        if let (Some(file_type), Some(creator)) = (self.file_type, self.file_creator) {
            info.file_type = OsType::from_u32(file_type);
            info.creator = OsType::from_u32(creator);
        }
        if let Some(finder_flags) = self.finder_flags {
            info.flags = finder_flags;
        }
        match self.position() {
            Some(position) => info.position = position,
            None => {
                info.flags &= !flags::HAS_BEEN_INITED;
                info.position = Point::default();
            }
        }
        info
    }

    /// DInfo for a folder, with defaults for anything the extractor omitted
    pub fn folder_info(&self) -> FolderInfo {
        let mut info = FolderInfo {
            rect: self.window_rect().unwrap_or_default(),
            flags: self.finder_flags.unwrap_or(0),
            position: Point::default(),
            view: self.window_view.unwrap_or(DEFAULT_FOLDER_VIEW),
        };
        match self.position() {
            Some(position) => info.position = position,
            None => info.flags &= !flags::HAS_BEEN_INITED,
        }
        info
    }

    /// Creation/modification dates; unparseable values fall back to zero
    pub fn timestamps(&self, now: DateTime<Utc>) -> Timestamps {
        Timestamps {
            created: convert_optional_date(self.creation_date.as_deref(), now),
            modified: convert_optional_date(self.modification_date.as_deref(), now),
        }
    }
}

fn convert_optional_date(date: Option<&str>, now: DateTime<Utc>) -> u32 {
    match date {
        Some(date) => convert_date_at(date, now).unwrap_or_else(|e| {
            warn!(date, error = %e, "Ignoring unparseable timestamp");
            0
        }),
        None => 0,
    }
}
