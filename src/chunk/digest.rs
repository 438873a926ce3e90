//! Salted chunk digests

use crate::error::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Digest length in bytes
pub const DIGEST_LEN: usize = 16;

/// Salt used for raw image chunks
pub const CHUNK_SALT: &[u8] = b"raw";

/// Longest salt BLAKE2b accepts
pub const MAX_SALT_LEN: usize = blake2b_simd::SALTBYTES;

/// 16-byte content address of a chunk, rendered as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkDigest([u8; DIGEST_LEN]);

impl ChunkDigest {
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ChunkDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChunkDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkDigest({})", self.to_hex())
    }
}

impl FromStr for ChunkDigest {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| StoreError::InvalidDigest(format!("{}: {}", s, e)))?;
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            StoreError::InvalidDigest(format!("{}: expected {} bytes", s, DIGEST_LEN))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for ChunkDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChunkDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest of `data` under `salt`
///
/// BLAKE2b with a 16-byte output and `salt` in the parameter block, so
/// existing chunk stores keep their names. Salts longer than
/// [`MAX_SALT_LEN`] are cut to that length; [`crate::chunk::Chunker::with_salt`]
/// rejects them up front.
pub fn salted_digest(salt: &[u8], data: &[u8]) -> ChunkDigest {
    let salt = &salt[..salt.len().min(MAX_SALT_LEN)];
    let hash = blake2b_simd::Params::new()
        .hash_length(DIGEST_LEN)
        .salt(salt)
        .hash(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(hash.as_bytes());
    ChunkDigest(out)
}
