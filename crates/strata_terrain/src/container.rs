//! # Terrain Container
//!
//! The top-level file: a header, the layer table, the layer group table and
//! every cell.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ magic[12] endianness:u8 version:u64 encoding:i32             │
//! │ compression:i32 layerCount:i32 groupCount:i32 cellCount:i32  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ layers:  name:string material:guid                 × layers  │
//! │ groups:  slotCount:i32 layerIndex:i32 × slotCount  × groups  │
//! │          mask section                                        │
//! │ cells:   see [`TerrainCell`]                       × cells   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The magic and the endianness byte are read before anything else, so a
//! container written in either byte order is readable on any host.

use crate::cell::{CellCoord, LodSlot, TerrainCell};
use crate::error::{IoContext, TerrainError, TerrainResult};
use crate::format::{FormatContext, LoadMode};
use crate::layer::{GroupId, LayerRef, TerrainLayer, TerrainLayerGroup, MAX_LAYERS_PER_GROUP};
use crate::lod::Edge;
use crate::mask::PackedLayerMask;
use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::sync::Arc;
use strata_io::{Compression, Endianness, ReadExt, TextEncoding, WriteExt};
use tracing::{debug, info, warn};

/// Fixed container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainHeader {
    /// Byte order of everything after the endianness byte.
    pub endianness: Endianness,
    /// Format version.
    pub version: u64,
    /// String encoding.
    pub encoding: TextEncoding,
    /// Section compression.
    pub compression: Compression,
    /// Entries in the layer table.
    pub layer_count: u32,
    /// Entries in the group table.
    pub group_count: u32,
    /// Number of cells.
    pub cell_count: u32,
}

impl TerrainHeader {
    /// File signature.
    pub const MAGIC: [u8; 12] = *b"STRATATERRN\0";
    /// Oldest readable version.
    pub const MIN_VERSION: u64 = 1;
    /// Newest readable version.
    pub const MAX_VERSION: u64 = 1;
    /// Version written by this build.
    pub const CURRENT_VERSION: u64 = 1;

    /// Encoding settings the header selects.
    #[must_use]
    pub const fn format(&self) -> FormatContext {
        FormatContext::new(self.endianness, self.encoding, self.compression)
    }

    /// Reads and validates a header.
    ///
    /// # Errors
    ///
    /// [`TerrainError::MagicMismatch`], [`TerrainError::UnsupportedVersion`],
    /// [`TerrainError::UnknownEnum`], [`TerrainError::InvalidData`] for a
    /// negative count and [`TerrainError::Truncated`] on a short stream.
    pub fn read<R: Read>(reader: &mut R) -> TerrainResult<Self> {
        let mut magic = [0u8; 12];
        reader.read_exact(&mut magic).section("header")?;
        if magic != Self::MAGIC {
            return Err(TerrainError::MagicMismatch { found: magic });
        }

        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag).section("header")?;
        let endianness = Endianness::from_u8(tag[0]).ok_or(TerrainError::UnknownEnum {
            kind: "endianness",
            value: i64::from(tag[0]),
        })?;
        let e = endianness;

        let version = reader.read_u64_in(e).section("header")?;
        if !(Self::MIN_VERSION..=Self::MAX_VERSION).contains(&version) {
            return Err(TerrainError::UnsupportedVersion {
                found: version,
                min: Self::MIN_VERSION,
                max: Self::MAX_VERSION,
            });
        }

        let raw = reader.read_i32_in(e).section("header")?;
        let encoding = TextEncoding::from_i32(raw).ok_or(TerrainError::UnknownEnum {
            kind: "text encoding",
            value: i64::from(raw),
        })?;
        let raw = reader.read_i32_in(e).section("header")?;
        let compression = Compression::from_i32(raw).ok_or(TerrainError::UnknownEnum {
            kind: "compression",
            value: i64::from(raw),
        })?;

        let mut count = |what: &str| -> TerrainResult<u32> {
            let raw = reader.read_i32_in(e).section("header")?;
            u32::try_from(raw).map_err(|_| TerrainError::InvalidData {
                section: "header",
                reason: format!("negative {what} count {raw}"),
            })
        };
        let layer_count = count("layer")?;
        let group_count = count("group")?;
        let cell_count = count("cell")?;

        Ok(Self {
            endianness,
            version,
            encoding,
            compression,
            layer_count,
            group_count,
            cell_count,
        })
    }

    /// Writes the header.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidData`] if a count does not fit an `i32`, and
    /// sink failures.
    pub fn write<W: Write>(&self, writer: &mut W) -> TerrainResult<()> {
        let e = self.endianness;
        writer.write_all(&Self::MAGIC).section("header")?;
        writer.write_all(&[e.to_u8()]).section("header")?;
        writer.write_u64_in(e, self.version).section("header")?;
        writer.write_i32_in(e, self.encoding.to_i32()).section("header")?;
        writer.write_i32_in(e, self.compression.to_i32()).section("header")?;
        for count in [self.layer_count, self.group_count, self.cell_count] {
            let count = i32::try_from(count).map_err(|_| TerrainError::InvalidData {
                section: "header",
                reason: format!("count {count} exceeds i32"),
            })?;
            writer.write_i32_in(e, count).section("header")?;
        }
        Ok(())
    }
}

/// Encoding choices for [`TerrainContainer::save`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// String encoding.
    pub encoding: TextEncoding,
    /// Byte order.
    pub endianness: Endianness,
    /// Section compression.
    pub compression: Compression,
}

impl SaveOptions {
    /// Encoding settings used for every section.
    #[must_use]
    pub const fn format(&self) -> FormatContext {
        FormatContext::new(self.endianness, self.encoding, self.compression)
    }
}

/// Cells adjacent to a coordinate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neighbors<'a> {
    /// +Z neighbour.
    pub north: Option<&'a TerrainCell>,
    /// -Z neighbour.
    pub south: Option<&'a TerrainCell>,
    /// +X neighbour.
    pub east: Option<&'a TerrainCell>,
    /// -X neighbour.
    pub west: Option<&'a TerrainCell>,
}

impl<'a> Neighbors<'a> {
    /// Neighbour across `edge`.
    #[must_use]
    pub const fn get(&self, edge: Edge) -> Option<&'a TerrainCell> {
        match edge {
            Edge::North => self.north,
            Edge::South => self.south,
            Edge::East => self.east,
            Edge::West => self.west,
        }
    }
}

/// Layers, layer groups and cells of one terrain.
#[derive(Debug, Default)]
pub struct TerrainContainer {
    layers: Vec<LayerRef>,
    groups: Vec<TerrainLayerGroup>,
    cells: Vec<TerrainCell>,
    index: HashMap<CellCoord, usize>,
    format: FormatContext,
}

impl TerrainContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding of the last load or save.
    #[must_use]
    pub const fn format(&self) -> FormatContext {
        self.format
    }

    /// Registers a layer and returns its shared handle.
    pub fn add_layer(&mut self, layer: TerrainLayer) -> LayerRef {
        let layer = Arc::new(layer);
        self.layers.push(Arc::clone(&layer));
        layer
    }

    /// Registered layers.
    #[must_use]
    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    fn layer_index(&self, layer: &LayerRef) -> Option<usize> {
        self.layers.iter().position(|l| Arc::ptr_eq(l, layer))
    }

    /// Adds a layer group and returns its id.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_layer_group(&mut self, group: TerrainLayerGroup) -> GroupId {
        self.groups.push(group);
        GroupId((self.groups.len() - 1) as u32)
    }

    /// Layer groups in id order.
    #[must_use]
    pub fn layer_groups(&self) -> &[TerrainLayerGroup] {
        &self.groups
    }

    /// Group by id.
    #[must_use]
    pub fn layer_group(&self, id: GroupId) -> Option<&TerrainLayerGroup> {
        self.groups.get(id.index())
    }

    /// Mutable group by id.
    pub fn layer_group_mut(&mut self, id: GroupId) -> Option<&mut TerrainLayerGroup> {
        self.groups.get_mut(id.index())
    }

    /// Adds a cell.
    ///
    /// # Errors
    ///
    /// [`TerrainError::DuplicateCell`] if the coordinate is taken, and
    /// [`TerrainError::UnknownGroup`] if the cell references a missing group.
    pub fn insert_cell(&mut self, cell: TerrainCell) -> TerrainResult<()> {
        let coord = cell.coord();
        if self.index.contains_key(&coord) {
            return Err(TerrainError::DuplicateCell { x: coord.x, y: coord.y });
        }
        if let Some(bad) = cell.layer_groups().iter().find(|g| g.index() >= self.groups.len()) {
            return Err(TerrainError::UnknownGroup {
                index: i64::from(bad.0),
                len: self.groups.len(),
            });
        }
        self.index.insert(coord, self.cells.len());
        self.cells.push(cell);
        Ok(())
    }

    /// Removes and returns the cell at `coord`.
    pub fn remove_cell(&mut self, coord: CellCoord) -> Option<TerrainCell> {
        let position = self.index.remove(&coord)?;
        let cell = self.cells.remove(position);
        self.rebuild_index();
        Some(cell)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.coord(), i))
            .collect();
    }

    /// Cells in insertion order.
    #[must_use]
    pub fn cells(&self) -> &[TerrainCell] {
        &self.cells
    }

    /// Cell at `coord`.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&TerrainCell> {
        self.index.get(&coord).map(|&i| &self.cells[i])
    }

    /// Mutable cell at `coord`.
    pub fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut TerrainCell> {
        let i = *self.index.get(&coord)?;
        self.cells.get_mut(i)
    }

    /// The four cells around `coord`.
    #[must_use]
    pub fn neighbors(&self, coord: CellCoord) -> Neighbors<'_> {
        let at = |edge| self.cell(coord.neighbor(edge));
        Neighbors {
            north: at(Edge::North),
            south: at(Edge::South),
            east: at(Edge::East),
            west: at(Edge::West),
        }
    }

    /// Reads a container.
    ///
    /// In [`LoadMode::Streaming`] height fields and LOD meshes stay on disk;
    /// resolve them with [`TerrainContainer::load_deferred`] or per LOD
    /// through [`TerrainCell::load_lod`].
    ///
    /// # Errors
    ///
    /// Any format, truncation or codec error. Nothing is returned on error.
    pub fn load<R: Read + Seek>(reader: &mut R, mode: LoadMode) -> TerrainResult<Self> {
        let header = TerrainHeader::read(reader)?;
        let ctx = header.format();
        let e = ctx.endianness;
        debug!(?header, "read container header");

        let mut container = Self {
            format: ctx,
            ..Self::default()
        };

        for _ in 0..header.layer_count {
            let name = reader.read_string_in(e, ctx.encoding).section("layer")?;
            let material = reader.read_uuid().section("layer")?;
            container.add_layer(TerrainLayer::new(name, material));
        }

        for _ in 0..header.group_count {
            let group = container.read_group(reader, &ctx)?;
            container.groups.push(group);
        }

        let group_count = container.groups.len();
        for _ in 0..header.cell_count {
            let cell = TerrainCell::read(reader, mode, &ctx, group_count)?;
            container.insert_cell(cell)?;
        }

        info!(
            layers = container.layers.len(),
            groups = container.groups.len(),
            cells = container.cells.len(),
            ?mode,
            "loaded terrain container"
        );
        Ok(container)
    }

    fn read_group<R: Read + Seek>(&self, reader: &mut R, ctx: &FormatContext) -> TerrainResult<TerrainLayerGroup> {
        let e = ctx.endianness;
        let slots = reader.read_i32_in(e).section("layer group")?;
        let slots = usize::try_from(slots)
            .ok()
            .filter(|&n| n <= MAX_LAYERS_PER_GROUP)
            .ok_or_else(|| TerrainError::InvalidData {
                section: "layer group",
                reason: format!("{slots} layer slots"),
            })?;

        let mut members = Vec::with_capacity(slots);
        for _ in 0..slots {
            let raw = reader.read_i32_in(e).section("layer group")?;
            if raw == -1 {
                continue;
            }
            let layer = usize::try_from(raw)
                .ok()
                .and_then(|i| self.layers.get(i))
                .ok_or_else(|| TerrainError::InvalidData {
                    section: "layer group",
                    reason: format!("layer index {raw} outside {} layers", self.layers.len()),
                })?;
            members.push(Arc::clone(layer));
        }

        let mut group = TerrainLayerGroup::with_mask(PackedLayerMask::read(reader, ctx)?);
        for layer in members {
            group.add_layer(layer)?;
        }
        Ok(group)
    }

    /// Writes the container and refreshes every cell's seek table.
    ///
    /// # Errors
    ///
    /// [`TerrainError::UnknownLayer`] if a group references a layer the
    /// container does not own, [`TerrainError::LodNotLoaded`] or
    /// [`TerrainError::HeightFieldNotLoaded`] for streamed cells, and sink
    /// or codec failures.
    pub fn save<W: Write + Seek>(&mut self, writer: &mut W, options: &SaveOptions) -> TerrainResult<()> {
        let ctx = options.format();
        let e = ctx.endianness;

        // Resolve every group and check every cell before the first byte is written.
        let mut group_slots = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut slots = [-1i32; MAX_LAYERS_PER_GROUP];
            for (slot, layer) in slots.iter_mut().zip(group.iter()) {
                let index = self.layer_index(layer).ok_or_else(|| TerrainError::UnknownLayer {
                    name: layer.name().to_owned(),
                })?;
                *slot = i32::try_from(index).map_err(|_| TerrainError::InvalidData {
                    section: "layer group",
                    reason: "layer table exceeds i32".into(),
                })?;
            }
            group_slots.push(slots);
        }
        for cell in &self.cells {
            cell.ensure_writable(self.groups.len()).map_err(|err| {
                warn!(coord = ?cell.coord(), error = %err, "cell can not be saved");
                err
            })?;
        }

        let count = |n: usize| {
            u32::try_from(n).map_err(|_| TerrainError::InvalidData {
                section: "header",
                reason: format!("{n} entries"),
            })
        };
        let header = TerrainHeader {
            endianness: e,
            version: TerrainHeader::CURRENT_VERSION,
            encoding: ctx.encoding,
            compression: ctx.compression,
            layer_count: count(self.layers.len())?,
            group_count: count(self.groups.len())?,
            cell_count: count(self.cells.len())?,
        };
        header.write(writer)?;

        for layer in &self.layers {
            writer.write_string_in(e, ctx.encoding, layer.name()).section("layer")?;
            writer.write_uuid(&layer.material()).section("layer")?;
        }

        for (group, slots) in self.groups.iter().zip(&group_slots) {
            writer.write_i32_in(e, MAX_LAYERS_PER_GROUP as i32).section("layer group")?;
            for &slot in slots {
                writer.write_i32_in(e, slot).section("layer group")?;
            }
            group.mask().write(writer, &ctx)?;
        }

        let group_count = self.groups.len();
        for cell in &mut self.cells {
            cell.write(writer, &ctx, group_count)?;
        }
        writer.flush().section("container")?;

        self.format = ctx;
        info!(
            layers = header.layer_count,
            groups = header.group_count,
            cells = header.cell_count,
            compression = ?ctx.compression,
            endianness = ?ctx.endianness,
            "saved terrain container"
        );
        Ok(())
    }

    /// Loads every deferred height field and LOD mesh from `reader`, which
    /// must be the stream the container was loaded from.
    ///
    /// # Errors
    ///
    /// The first load failure; cells before it stay resolved.
    pub fn load_deferred<R: Read + Seek>(&mut self, reader: &mut R) -> TerrainResult<()> {
        let ctx = self.format;
        let mut loaded = 0usize;
        for cell in &mut self.cells {
            cell.load_height_data(reader, &ctx)?;
            let pending: Vec<usize> = cell
                .lod_slots()
                .iter()
                .enumerate()
                .filter(|(_, s)| matches!(s, LodSlot::NotLoaded))
                .map(|(i, _)| i)
                .collect();
            for index in pending {
                cell.load_lod(index, reader, &ctx)?;
                loaded += 1;
            }
        }
        debug!(lods = loaded, "resolved deferred terrain data");
        Ok(())
    }

    /// Fuses positions and averages normals across every shared edge.
    ///
    /// Each cell is paired with its East and North neighbour, so every seam
    /// is processed once. Only LOD indices loaded on both sides are touched.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodMismatch`] if paired meshes disagree in level,
    /// rows or columns.
    pub fn stitch_seams(&mut self) -> TerrainResult<()> {
        let mut seams = 0usize;
        for i in 0..self.cells.len() {
            let coord = self.cells[i].coord();
            for edge in [Edge::East, Edge::North] {
                let Some(&j) = self.index.get(&coord.neighbor(edge)) else {
                    continue;
                };
                let (cell, other) = pair_mut(&mut self.cells, i, j);
                let shared = cell.lod_count().min(other.lod_count());
                for lod in 0..shared {
                    let (Some(a), Some(b)) = (cell.lod_mut(lod), other.lod_mut(lod)) else {
                        continue;
                    };
                    a.fuse_edge(edge, b)?;
                    a.average_edge(edge, b)?;
                    seams += 1;
                }
            }
        }
        debug!(seams, "stitched terrain seams");
        Ok(())
    }
}

/// Two distinct mutable elements of one slice.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::HeightField;
    use crate::lod::LodMesh;
    use std::io::Cursor;
    use uuid::Uuid;

    fn flat_cell(x: i32, y: i32, elevation: f32) -> TerrainCell {
        let hf = HeightField::from_data(4, 4, vec![elevation; 16]).unwrap();
        let mut mesh = LodMesh::new(0, 8, 8, 5, 5).unwrap();
        mesh.generate(&hf);
        let mut cell = TerrainCell::new(CellCoord::new(x, y), Uuid::from_u128(x as u128 * 31 + y as u128), hf);
        cell.set_lods(vec![mesh]);
        cell
    }

    fn header_bytes(edit: impl FnOnce(&mut TerrainHeader)) -> Vec<u8> {
        let mut header = TerrainHeader {
            endianness: Endianness::Little,
            version: TerrainHeader::CURRENT_VERSION,
            encoding: TextEncoding::Utf8,
            compression: Compression::None,
            layer_count: 0,
            group_count: 0,
            cell_count: 0,
        };
        edit(&mut header);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_header_roundtrip_big_endian() {
        let buf = header_bytes(|h| {
            h.endianness = Endianness::Big;
            h.encoding = TextEncoding::Utf16;
            h.cell_count = 9;
        });
        assert_eq!(buf.len(), 12 + 1 + 8 + 4 * 5);
        let back = TerrainHeader::read(&mut buf.as_slice()).unwrap();
        assert_eq!(back.endianness, Endianness::Big);
        assert_eq!(back.encoding, TextEncoding::Utf16);
        assert_eq!(back.cell_count, 9);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = header_bytes(|_| {});
        buf[0] = b'X';
        assert!(matches!(
            TerrainHeader::read(&mut buf.as_slice()),
            Err(TerrainError::MagicMismatch { found }) if found[0] == b'X'
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let buf = header_bytes(|h| h.version = 2);
        assert!(matches!(
            TerrainHeader::read(&mut buf.as_slice()),
            Err(TerrainError::UnsupportedVersion { found: 2, min: 1, max: 1 })
        ));
    }

    #[test]
    fn test_unknown_enums_and_negative_counts() {
        let mut buf = header_bytes(|_| {});
        buf[12] = 7;
        assert!(matches!(
            TerrainHeader::read(&mut buf.as_slice()),
            Err(TerrainError::UnknownEnum { kind: "endianness", value: 7 })
        ));

        let mut buf = header_bytes(|_| {});
        // compression:i32 follows magic, endianness byte, version and encoding.
        buf[25..29].copy_from_slice(&9i32.to_le_bytes());
        assert!(matches!(
            TerrainHeader::read(&mut buf.as_slice()),
            Err(TerrainError::UnknownEnum { kind: "compression", value: 9 })
        ));

        let mut buf = header_bytes(|_| {});
        buf[33..37].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            TerrainHeader::read(&mut buf.as_slice()),
            Err(TerrainError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let buf = header_bytes(|_| {});
        assert!(matches!(
            TerrainHeader::read(&mut &buf[..20]),
            Err(TerrainError::Truncated { section: "header" })
        ));
    }

    #[test]
    fn test_cells_and_neighbors() {
        let mut container = TerrainContainer::new();
        container.insert_cell(flat_cell(0, 0, 0.0)).unwrap();
        container.insert_cell(flat_cell(1, 0, 0.0)).unwrap();
        container.insert_cell(flat_cell(0, 1, 0.0)).unwrap();
        assert!(matches!(
            container.insert_cell(flat_cell(1, 0, 0.0)),
            Err(TerrainError::DuplicateCell { x: 1, y: 0 })
        ));

        let around = container.neighbors(CellCoord::new(0, 0));
        assert_eq!(around.east.unwrap().coord(), CellCoord::new(1, 0));
        assert_eq!(around.get(Edge::North).unwrap().coord(), CellCoord::new(0, 1));
        assert!(around.west.is_none() && around.south.is_none());

        assert!(container.remove_cell(CellCoord::new(0, 0)).is_some());
        assert!(container.cell(CellCoord::new(0, 0)).is_none());
        assert_eq!(container.cell(CellCoord::new(0, 1)).unwrap().coord(), CellCoord::new(0, 1));
    }

    #[test]
    fn test_foreign_layer_rejected_on_save() {
        let mut container = TerrainContainer::new();
        let mut group = TerrainLayerGroup::new(2, 2).unwrap();
        group.add_layer(Arc::new(TerrainLayer::new("stray", Uuid::nil()))).unwrap();
        container.add_layer_group(group);

        let mut out = Cursor::new(Vec::new());
        let err = container.save(&mut out, &SaveOptions::default()).unwrap_err();
        assert!(matches!(err, TerrainError::UnknownLayer { ref name } if name == "stray"));
        assert!(out.get_ref().is_empty());
    }

    #[test]
    fn test_unknown_group_on_insert() {
        let mut container = TerrainContainer::new();
        let mut cell = flat_cell(0, 0, 0.0);
        cell.add_layer_group(GroupId(3));
        assert!(matches!(
            container.insert_cell(cell),
            Err(TerrainError::UnknownGroup { index: 3, len: 0 })
        ));
    }

    #[test]
    fn test_stitch_meets_in_the_middle() {
        let mut container = TerrainContainer::new();
        container.insert_cell(flat_cell(0, 0, 2.0)).unwrap();
        container.insert_cell(flat_cell(1, 0, 6.0)).unwrap();
        container.stitch_seams().unwrap();

        let west = container.cell(CellCoord::new(0, 0)).unwrap().lod(0).unwrap();
        let east = container.cell(CellCoord::new(1, 0)).unwrap().lod(0).unwrap();
        for column in 0..5 {
            let a = west.positions()[west.index_of(4, column)];
            let b = east.positions()[east.index_of(0, column)];
            assert_eq!(a.y, 4.0);
            assert_eq!(b.y, 4.0);
            assert_eq!(
                west.normals()[west.index_of(4, column)],
                east.normals()[east.index_of(0, column)]
            );
        }
        // Interior vertices are untouched.
        assert_eq!(west.positions()[west.index_of(1, 2)].y, 2.0);
        assert_eq!(west.bounding_box().max.y, 4.0);
    }

    #[test]
    fn test_stitch_mismatch_propagates() {
        let mut container = TerrainContainer::new();
        container.insert_cell(flat_cell(0, 0, 0.0)).unwrap();
        let mut coarse = flat_cell(0, 1, 0.0);
        let mut mesh = LodMesh::new(0, 8, 8, 3, 3).unwrap();
        mesh.generate(coarse.height_field().unwrap());
        coarse.set_lods(vec![mesh]);
        container.insert_cell(coarse).unwrap();
        assert!(matches!(
            container.stitch_seams(),
            Err(TerrainError::LodMismatch { .. })
        ));
    }

    #[test]
    fn test_pair_mut_either_order() {
        let mut items = [1, 2, 3];
        let (a, b) = pair_mut(&mut items, 2, 0);
        std::mem::swap(a, b);
        assert_eq!(items, [3, 2, 1]);
    }
}
