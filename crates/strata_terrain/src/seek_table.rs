//! # LOD Seek Table
//!
//! Locates each compressed LOD block of a cell so one level can be loaded
//! without touching the others.
//!
//! ```text
//! entryCount:i32 | (lodLevel:u32, offset:u32, size:u32) × entryCount
//! ```
//!
//! Offsets are absolute positions in the container stream.

use crate::error::{IoContext, TerrainError, TerrainResult};
use std::io::{Read, Write};
use strata_io::{Endianness, ReadExt, SectionSpan, WriteExt};

/// Location of one LOD block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SeekEntry {
    /// LOD level stored in the block.
    pub lod_level: u32,
    /// Absolute stream position of the block.
    pub offset: u32,
    /// Compressed block length.
    pub size: u32,
}

impl SeekEntry {
    /// The block as a section span.
    #[must_use]
    pub const fn span(&self) -> SectionSpan {
        SectionSpan::new(self.offset as u64, self.size)
    }
}

/// Ordered LOD block locations of one cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LodSeekTable {
    entries: Vec<SeekEntry>,
}

impl LodSeekTable {
    /// Bytes per entry.
    pub const ENTRY_SIZE: usize = 12;

    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Serialized size of a table with `count` entries.
    #[must_use]
    pub const fn size_for(count: usize) -> usize {
        4 + count * Self::ENTRY_SIZE
    }

    /// Serialized size of this table.
    #[must_use]
    pub fn size(&self) -> usize {
        Self::size_for(self.entries.len())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in write order.
    #[must_use]
    pub fn entries(&self) -> &[SeekEntry] {
        &self.entries
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Appends an entry.
    pub fn push(&mut self, lod_level: u32, offset: u32, size: u32) {
        self.entries.push(SeekEntry {
            lod_level,
            offset,
            size,
        });
    }

    /// Offset of the first block holding `lod_level`.
    #[must_use]
    pub fn offset_of(&self, lod_level: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.lod_level == lod_level)
            .map(|e| e.offset)
    }

    /// Entry at position `index`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::SeekIndexOutOfRange`].
    pub fn entry(&self, index: usize) -> TerrainResult<&SeekEntry> {
        self.entries.get(index).ok_or(TerrainError::SeekIndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Offset of the entry at position `index`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::SeekIndexOutOfRange`].
    pub fn offset_from_index(&self, index: usize) -> TerrainResult<u32> {
        self.entry(index).map(|e| e.offset)
    }

    /// Writes the table.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn write<W: Write>(&self, writer: &mut W, e: Endianness) -> TerrainResult<()> {
        let count = i32::try_from(self.entries.len()).map_err(|_| TerrainError::InvalidData {
            section: "seek table",
            reason: "too many entries".into(),
        })?;
        writer.write_i32_in(e, count).section("seek table")?;
        for entry in &self.entries {
            writer
                .write_u32_slice_in(e, &[entry.lod_level, entry.offset, entry.size])
                .section("seek table")?;
        }
        Ok(())
    }

    /// Reads a table.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidData`] for a negative count,
    /// [`TerrainError::Truncated`] on a short stream.
    pub fn read<R: Read>(reader: &mut R, e: Endianness) -> TerrainResult<Self> {
        let count = reader.read_i32_in(e).section("seek table")?;
        let count = usize::try_from(count).map_err(|_| TerrainError::InvalidData {
            section: "seek table",
            reason: format!("negative entry count {count}"),
        })?;
        let raw = reader.read_u32_array_in(e, count * 3).section("seek table")?;
        let entries = raw
            .chunks_exact(3)
            .map(|c| SeekEntry {
                lod_level: c[0],
                offset: c[1],
                size: c[2],
            })
            .collect();
        Ok(Self { entries })
    }
}
