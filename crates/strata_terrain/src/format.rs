//! Per-container encoding settings passed down to every section.

use strata_io::{Compression, Endianness, TextEncoding};

/// How cell payloads are loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Parse height fields and every LOD mesh while loading.
    #[default]
    Immediate,
    /// Record payload positions and parse on request.
    Streaming,
}

/// Encoding settings shared by every section of one container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FormatContext {
    /// Byte order of all scalars.
    pub endianness: Endianness,
    /// String encoding.
    pub encoding: TextEncoding,
    /// Section compression.
    pub compression: Compression,
}

impl FormatContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(endianness: Endianness, encoding: TextEncoding, compression: Compression) -> Self {
        Self {
            endianness,
            encoding,
            compression,
        }
    }
}
