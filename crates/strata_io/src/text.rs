//! Text encodings for length-prefixed strings.

use crate::Endianness;
use serde::{Deserialize, Serialize};
use std::io;

/// Encoding applied to every string in a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// UTF-8 bytes.
    #[default]
    Utf8,
    /// UTF-16 code units in the container's byte order.
    Utf16,
}

impl TextEncoding {
    /// Decodes the on-disk identifier.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Utf8),
            1 => Some(Self::Utf16),
            _ => None,
        }
    }

    /// Encodes the on-disk identifier.
    #[must_use]
    pub const fn to_i32(self) -> i32 {
        match self {
            Self::Utf8 => 0,
            Self::Utf16 => 1,
        }
    }

    /// Encodes `text` into bytes.
    #[must_use]
    pub fn encode(self, text: &str, endianness: Endianness) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16 => text
                .encode_utf16()
                .flat_map(|unit| match endianness {
                    Endianness::Little => unit.to_le_bytes(),
                    Endianness::Big => unit.to_be_bytes(),
                })
                .collect(),
        }
    }

    /// Decodes bytes produced by [`TextEncoding::encode`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for malformed sequences or an odd UTF-16 length.
    pub fn decode(self, bytes: Vec<u8>, endianness: Endianness) -> io::Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Self::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "odd byte count in UTF-16 string",
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        match endianness {
                            Endianness::Little => u16::from_le_bytes(pair),
                            Endianness::Big => u16::from_be_bytes(pair),
                        }
                    })
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_roundtrip_both_orders() {
        let text = "Grass \u{00e9}t\u{00e9} \u{1F332}";
        for e in [Endianness::Little, Endianness::Big] {
            let bytes = TextEncoding::Utf16.encode(text, e);
            assert_eq!(TextEncoding::Utf16.decode(bytes, e).unwrap(), text);
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = TextEncoding::Utf8
            .decode(vec![0xff, 0xfe], Endianness::Little)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_odd_utf16_rejected() {
        assert!(TextEncoding::Utf16
            .decode(vec![0x41, 0x00, 0x42], Endianness::Little)
            .is_err());
    }

    #[test]
    fn test_identifier_roundtrip() {
        for enc in [TextEncoding::Utf8, TextEncoding::Utf16] {
            assert_eq!(TextEncoding::from_i32(enc.to_i32()), Some(enc));
        }
        assert_eq!(TextEncoding::from_i32(7), None);
    }
}
