//! Fixed-width FInfo/DInfo records

use super::{flags, AUTO_ARRANGE_POSITION, DEFAULT_FOLDER_VIEW, FILE_INFO_LEN, FOLDER_INFO_LEN};
use crate::error::CodecError;
use std::fmt;

/// Four-character code identifying a file's type or creator
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsType(pub [u8; 4]);

impl OsType {
    /// Placeholder code used when the source carries no type information
    pub const UNKNOWN: OsType = OsType(*b"????");

    pub fn from_u32(value: u32) -> Self {
        OsType(value.to_be_bytes())
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl Default for OsType {
    fn default() -> Self {
        OsType::UNKNOWN
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OsType(\"{}\")", self)
    }
}

/// Icon or window location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

/// Folder window rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

/// DInfo: folder window geometry and Finder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderInfo {
    pub rect: Rect,
    pub flags: u16,
    pub position: Point,
    pub view: u16,
}

impl Default for FolderInfo {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            flags: 0,
            position: Point::default(),
            view: DEFAULT_FOLDER_VIEW,
        }
    }
}

impl FolderInfo {
    /// Decode a 16-byte DInfo record
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let b = expect_len(bytes, FOLDER_INFO_LEN, "DInfo")?;
        Ok(Self {
            rect: Rect {
                top: read_i16(b, 0),
                left: read_i16(b, 2),
                bottom: read_i16(b, 4),
                right: read_i16(b, 6),
            },
            flags: read_u16(b, 8),
            // Points are stored vertical coordinate first
            position: Point {
                y: read_i16(b, 10),
                x: read_i16(b, 12),
            },
            view: read_u16(b, 14),
        })
    }

    /// Encode as a 16-byte DInfo record
    pub fn encode(&self) -> [u8; FOLDER_INFO_LEN] {
        let mut out = [0u8; FOLDER_INFO_LEN];
        out[0..2].copy_from_slice(&self.rect.top.to_be_bytes());
        out[2..4].copy_from_slice(&self.rect.left.to_be_bytes());
        out[4..6].copy_from_slice(&self.rect.bottom.to_be_bytes());
        out[6..8].copy_from_slice(&self.rect.right.to_be_bytes());
        out[8..10].copy_from_slice(&self.flags.to_be_bytes());
        out[10..12].copy_from_slice(&self.position.y.to_be_bytes());
        out[12..14].copy_from_slice(&self.position.x.to_be_bytes());
        out[14..16].copy_from_slice(&self.view.to_be_bytes());
        out
    }

    /// Let the Finder choose where the folder's icon goes
    pub fn request_auto_arrange(&mut self) {
        self.position = AUTO_ARRANGE_POSITION;
    }

    pub fn has_been_inited(&self) -> bool {
        self.flags & flags::HAS_BEEN_INITED != 0
    }
}

/// FInfo followed by the 16 bytes of FXInfo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileInfo {
    pub file_type: OsType,
    pub creator: OsType,
    pub flags: u16,
    pub position: Point,
    pub reserved: u16,
    pub extra: [u8; 16],
}

impl FileInfo {
    /// Decode a 32-byte FInfo + FXInfo record
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let b = expect_len(bytes, FILE_INFO_LEN, "FInfo")?;
        let mut file_type = [0u8; 4];
        let mut creator = [0u8; 4];
        let mut extra = [0u8; 16];
        file_type.copy_from_slice(&b[0..4]);
        creator.copy_from_slice(&b[4..8]);
        extra.copy_from_slice(&b[16..32]);
        Ok(Self {
            file_type: OsType(file_type),
            creator: OsType(creator),
            flags: read_u16(b, 8),
            position: Point {
                y: read_i16(b, 10),
                x: read_i16(b, 12),
            },
            reserved: read_u16(b, 14),
            extra,
        })
    }

    /// Encode as a 32-byte FInfo + FXInfo record
    pub fn encode(&self) -> [u8; FILE_INFO_LEN] {
        let mut out = [0u8; FILE_INFO_LEN];
        out[0..4].copy_from_slice(&self.file_type.0);
        out[4..8].copy_from_slice(&self.creator.0);
        out[8..10].copy_from_slice(&self.flags.to_be_bytes());
        out[10..12].copy_from_slice(&self.position.y.to_be_bytes());
        out[12..14].copy_from_slice(&self.position.x.to_be_bytes());
        out[14..16].copy_from_slice(&self.reserved.to_be_bytes());
        out[16..32].copy_from_slice(&self.extra);
        out
    }

    pub fn has_been_inited(&self) -> bool {
        self.flags & flags::HAS_BEEN_INITED != 0
    }
}

fn expect_len<'a>(
    bytes: &'a [u8],
    expected: usize,
    what: &'static str,
) -> Result<&'a [u8], CodecError> {
    if bytes.len() != expected {
        return Err(CodecError::InvalidLength {
            what,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
