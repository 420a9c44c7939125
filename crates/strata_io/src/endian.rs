//! Byte order tag written into container headers.

use serde::{Deserialize, Serialize};

/// Byte order used for every multi-byte scalar in a container.
///
/// Stored on disk as a single byte so it can be read before the
/// byte order of anything else is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Endianness {
    /// Least significant byte first.
    #[default]
    Little = 0,
    /// Most significant byte first.
    Big = 1,
}

impl Endianness {
    /// Byte order of the running target.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;
    /// Byte order of the running target.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    /// Decodes the on-disk tag.
    #[must_use]
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }

    /// Encodes the on-disk tag.
    #[must_use]
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// True when values in this order can be copied without swapping.
    #[must_use]
    #[inline]
    pub const fn is_native(self) -> bool {
        self as u8 == Self::NATIVE as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for e in [Endianness::Little, Endianness::Big] {
            assert_eq!(Endianness::from_u8(e.to_u8()), Some(e));
        }
        assert_eq!(Endianness::from_u8(2), None);
    }

    #[test]
    fn test_native_matches_target() {
        assert!(Endianness::NATIVE.is_native());
        #[cfg(target_endian = "little")]
        assert!(!Endianness::Big.is_native());
    }
}
