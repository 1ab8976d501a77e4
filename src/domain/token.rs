use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::error::KanbanError;

/// Row versions live in `[0, 2^32)` so they fit the four-byte wire form.
pub const VERSION_MODULUS: i64 = 1 << 32;

/// Optimistic concurrency token: a card's row version, sent over the wire as
/// base64 of the little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcurrencyToken(u32);

impl ConcurrencyToken {
    pub fn from_version(version: i64) -> Self {
        Self(version.rem_euclid(VERSION_MODULUS) as u32)
    }

    pub fn version(self) -> i64 {
        i64::from(self.0)
    }

    /// The token a row carries after one more successful write.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn encode(self) -> String {
        STANDARD.encode(self.0.to_le_bytes())
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, KanbanError> {
        let raw = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                KanbanError::PreconditionRequired(
                    "concurrency token is required for this operation".into(),
                )
            })?;

        let bytes = STANDARD.decode(raw).map_err(|_| {
            KanbanError::PreconditionRequired(
                "invalid concurrency token format (base64 expected)".into(),
            )
        })?;

        let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
            KanbanError::PreconditionRequired(
                "invalid concurrency token format (expected 4 bytes)".into(),
            )
        })?;

        Ok(Self(u32::from_le_bytes(bytes)))
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
