//! Core primitive types for the stowage stack.
//!
//! Kept separate to avoid circular dependencies between the deal engine
//! and the RPC layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of a [`ContentId`].
pub const CONTENT_ID_LENGTH: usize = 32;

/// Content-addressed identifier for stored payloads and deal proposals.
///
/// Rendered as 64 lowercase hex characters at every API boundary. Parsing
/// is strict: exact length, hex alphabet only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; CONTENT_ID_LENGTH]);

impl ContentId {
    /// Wrap a raw digest.
    pub const fn new(bytes: [u8; CONTENT_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw bytes of the identifier.
    pub const fn as_bytes(&self) -> &[u8; CONTENT_ID_LENGTH] {
        &self.0
    }
}

impl From<[u8; CONTENT_ID_LENGTH]> for ContentId {
    fn from(bytes: [u8; CONTENT_ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ContentId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl FromStr for ContentId {
    type Err = ParseContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != CONTENT_ID_LENGTH * 2 {
            return Err(ParseContentIdError::Length { chars: s.len() });
        }
        let mut bytes = [0u8; CONTENT_ID_LENGTH];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error parsing a [`ContentId`] from its string form.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseContentIdError {
    /// The string is not exactly 64 characters long.
    #[error("expected {} hex characters, got {chars}", CONTENT_ID_LENGTH * 2)]
    Length {
        /// Number of characters in the rejected string.
        chars: usize,
    },

    /// The string contains a non-hex character.
    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}
