//! # Terrain Cells
//!
//! One tile of the world: a height field, the layer groups painted on it,
//! and its LOD meshes.
//!
//! ## Stream layout
//!
//! ```text
//! x:i32 y:i32 guid[16]
//! height field section
//! groupCount:i32 groupIndex:i32 × groupCount
//! seek table (reserved on write, patched after the blocks)
//! LOD blocks, one compressed LodMesh per seek entry
//! ```
//!
//! In [`LoadMode::Streaming`] the height field and LOD blocks are skipped
//! and loaded later from a re-opened stream through the recorded offsets.

use crate::error::{IoContext, TerrainError, TerrainResult};
use crate::format::{FormatContext, LoadMode};
use crate::heightfield::{HeightField, HeightFieldHeader};
use crate::layer::GroupId;
use crate::lod::{Edge, LodMesh};
use crate::seek_table::LodSeekTable;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use strata_io::{section, ReadExt, Reservation, WriteExt};
use tracing::{debug, trace};
use uuid::Uuid;

/// Integer tile coordinate of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Tile index along world X.
    pub x: i32,
    /// Tile index along world Z.
    pub y: i32,
}

impl CellCoord {
    /// Creates a coordinate.
    #[must_use]
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate of the neighbour across `edge`.
    #[must_use]
    #[inline]
    pub const fn neighbor(self, edge: Edge) -> Self {
        let (dx, dy) = edge.offset();
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }
}

/// Height field state of a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum HeightSlot {
    /// Still on disk.
    Deferred(HeightFieldHeader),
    /// In memory.
    Loaded(HeightField),
}

/// Load state of one LOD.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LodSlot {
    /// Block has not been read.
    #[default]
    NotLoaded,
    /// Fully built mesh.
    Loaded(Arc<LodMesh>),
}

impl LodSlot {
    /// Mesh if loaded.
    #[must_use]
    pub fn mesh(&self) -> Option<&Arc<LodMesh>> {
        match self {
            Self::Loaded(mesh) => Some(mesh),
            Self::NotLoaded => None,
        }
    }

    /// True if a mesh is present.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Everything needed to load one LOD of a cell without borrowing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LodLocator {
    coord: CellCoord,
    seek_table: LodSeekTable,
    ctx: FormatContext,
}

impl LodLocator {
    /// Cell the locator belongs to.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Number of LOD blocks.
    #[must_use]
    pub fn lod_count(&self) -> usize {
        self.seek_table.len()
    }

    /// Level stored at `index`, if the index exists.
    #[must_use]
    pub fn lod_level(&self, index: usize) -> Option<u32> {
        self.seek_table.entry(index).ok().map(|e| e.lod_level)
    }

    /// Reads the block at seek index `index` from `reader`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodNotFound`] when the index has no entry or the block
    /// does not parse to the recorded level; [`TerrainError::Cancelled`]
    /// when the reader was interrupted.
    pub fn load<R: Read + Seek>(&self, index: usize, reader: &mut R) -> TerrainResult<LodMesh> {
        load_lod_block(&self.seek_table, &self.ctx, index, reader)
    }
}

fn load_lod_block<R: Read + Seek>(
    table: &LodSeekTable,
    ctx: &FormatContext,
    index: usize,
    reader: &mut R,
) -> TerrainResult<LodMesh> {
    let not_found = |reason: String| TerrainError::LodNotFound { index, reason };
    let entry = *table.entry(index).map_err(|e| not_found(e.to_string()))?;
    let e = ctx.endianness;

    let mesh = section::read_block(reader, entry.span(), ctx.compression, |r| LodMesh::read(r, e))
        .map_err(|err| match err {
            TerrainError::Cancelled => TerrainError::Cancelled,
            other => not_found(format!("block at {}: {other}", entry.offset)),
        })?;

    if mesh.lod_level() != entry.lod_level {
        return Err(not_found(format!(
            "block at {} holds level {}, expected {}",
            entry.offset,
            mesh.lod_level(),
            entry.lod_level
        )));
    }
    Ok(mesh)
}

/// One terrain tile.
#[derive(Clone, Debug)]
pub struct TerrainCell {
    coord: CellCoord,
    id: Uuid,
    height: HeightSlot,
    groups: Vec<GroupId>,
    seek_table: LodSeekTable,
    lods: Vec<LodSlot>,
}

impl TerrainCell {
    /// Creates a cell with no LODs and no layer groups.
    #[must_use]
    pub fn new(coord: CellCoord, id: Uuid, height_field: HeightField) -> Self {
        Self {
            coord,
            id,
            height: HeightSlot::Loaded(height_field),
            groups: Vec::new(),
            seek_table: LodSeekTable::new(),
            lods: Vec::new(),
        }
    }

    /// Tile coordinate.
    #[must_use]
    #[inline]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Globally unique id.
    #[must_use]
    #[inline]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Height field state.
    #[must_use]
    pub const fn height_slot(&self) -> &HeightSlot {
        &self.height
    }

    /// Loaded height field.
    ///
    /// # Errors
    ///
    /// [`TerrainError::HeightFieldNotLoaded`] while deferred.
    pub fn height_field(&self) -> TerrainResult<&HeightField> {
        match &self.height {
            HeightSlot::Loaded(hf) => Ok(hf),
            HeightSlot::Deferred(_) => Err(self.height_not_loaded()),
        }
    }

    /// Mutable loaded height field.
    ///
    /// # Errors
    ///
    /// [`TerrainError::HeightFieldNotLoaded`] while deferred.
    pub fn height_field_mut(&mut self) -> TerrainResult<&mut HeightField> {
        let err = self.height_not_loaded();
        match &mut self.height {
            HeightSlot::Loaded(hf) => Ok(hf),
            HeightSlot::Deferred(_) => Err(err),
        }
    }

    fn height_not_loaded(&self) -> TerrainError {
        TerrainError::HeightFieldNotLoaded {
            x: self.coord.x,
            y: self.coord.y,
        }
    }

    /// Layer groups applied to this cell.
    #[must_use]
    pub fn layer_groups(&self) -> &[GroupId] {
        &self.groups
    }

    /// Applies a group. Returns false if it was already applied.
    pub fn add_layer_group(&mut self, group: GroupId) -> bool {
        if self.groups.contains(&group) {
            return false;
        }
        self.groups.push(group);
        true
    }

    /// Removes a group. Returns false if it was not applied.
    pub fn remove_layer_group(&mut self, group: GroupId) -> bool {
        let before = self.groups.len();
        self.groups.retain(|&g| g != group);
        self.groups.len() != before
    }

    /// Seek table from the last read or write.
    #[must_use]
    pub const fn seek_table(&self) -> &LodSeekTable {
        &self.seek_table
    }

    /// Number of LOD slots.
    #[must_use]
    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }

    /// All LOD slots.
    #[must_use]
    pub fn lod_slots(&self) -> &[LodSlot] {
        &self.lods
    }

    /// Mesh at `index` if loaded.
    #[must_use]
    pub fn lod(&self, index: usize) -> Option<&Arc<LodMesh>> {
        self.lods.get(index).and_then(LodSlot::mesh)
    }

    /// Mutable mesh at `index`. A mesh shared with a reader is copied first.
    pub fn lod_mut(&mut self, index: usize) -> Option<&mut LodMesh> {
        match self.lods.get_mut(index) {
            Some(LodSlot::Loaded(mesh)) => Some(Arc::make_mut(mesh)),
            _ => None,
        }
    }

    /// Replaces every LOD slot with freshly generated meshes.
    pub fn set_lods(&mut self, meshes: Vec<LodMesh>) {
        self.lods = meshes
            .into_iter()
            .map(|m| LodSlot::Loaded(Arc::new(m)))
            .collect();
    }

    /// Locator for background loads.
    #[must_use]
    pub fn locator(&self, ctx: FormatContext) -> LodLocator {
        LodLocator {
            coord: self.coord,
            seek_table: self.seek_table.clone(),
            ctx,
        }
    }

    /// Reads the LOD at seek index `index` from a re-opened stream, without
    /// installing it.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodNotFound`] if the entry is missing or the block
    /// does not parse.
    pub fn load_lod_data<R: Read + Seek>(
        &self,
        index: usize,
        reader: &mut R,
        ctx: &FormatContext,
    ) -> TerrainResult<LodMesh> {
        load_lod_block(&self.seek_table, ctx, index, reader)
    }

    /// Swaps a mesh into slot `index` and returns the previous one.
    ///
    /// The previous mesh stays alive until the caller drops it.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodNotFound`] if `index` has no slot.
    pub fn install_lod(&mut self, index: usize, mesh: Arc<LodMesh>) -> TerrainResult<LodSlot> {
        let len = self.lods.len();
        let slot = self.lods.get_mut(index).ok_or_else(|| TerrainError::LodNotFound {
            index,
            reason: format!("cell has {len} LOD slots"),
        })?;
        Ok(std::mem::replace(slot, LodSlot::Loaded(mesh)))
    }

    /// [`TerrainCell::load_lod_data`] followed by [`TerrainCell::install_lod`].
    ///
    /// # Errors
    ///
    /// See both.
    pub fn load_lod<R: Read + Seek>(
        &mut self,
        index: usize,
        reader: &mut R,
        ctx: &FormatContext,
    ) -> TerrainResult<Arc<LodMesh>> {
        let mesh = Arc::new(self.load_lod_data(index, reader, ctx)?);
        self.install_lod(index, Arc::clone(&mesh))?;
        Ok(mesh)
    }

    /// Drops the mesh in slot `index` and returns it.
    pub fn unload_lod(&mut self, index: usize) -> Option<Arc<LodMesh>> {
        match std::mem::take(self.lods.get_mut(index)?) {
            LodSlot::Loaded(mesh) => Some(mesh),
            LodSlot::NotLoaded => None,
        }
    }

    /// Loads a deferred height field. No-op if already loaded.
    ///
    /// # Errors
    ///
    /// Truncation and codec errors.
    pub fn load_height_data<R: Read + Seek>(&mut self, reader: &mut R, ctx: &FormatContext) -> TerrainResult<()> {
        if let HeightSlot::Deferred(header) = self.height {
            let hf = header.load(reader, ctx.endianness, ctx.compression)?;
            self.height = HeightSlot::Loaded(hf);
        }
        Ok(())
    }

    /// Reads a cell.
    ///
    /// # Arguments
    ///
    /// * `mode` - Parse payloads now or record their positions
    /// * `group_count` - Size of the container's group table, for validation
    ///
    /// # Errors
    ///
    /// Format, truncation and codec errors; [`TerrainError::UnknownGroup`]
    /// for a group index outside the table.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        mode: LoadMode,
        ctx: &FormatContext,
        group_count: usize,
    ) -> TerrainResult<Self> {
        let e = ctx.endianness;
        let x = reader.read_i32_in(e).section("cell")?;
        let y = reader.read_i32_in(e).section("cell")?;
        let id = reader.read_uuid().section("cell")?;
        let coord = CellCoord::new(x, y);

        let header = HeightField::read_header(reader, e)?;
        let height = match mode {
            LoadMode::Immediate => HeightSlot::Loaded(header.load(reader, e, ctx.compression)?),
            LoadMode::Streaming => {
                reader.seek(SeekFrom::Start(header.span.end())).section("cell")?;
                HeightSlot::Deferred(header)
            }
        };

        let count = reader.read_i32_in(e).section("cell")?;
        let count = usize::try_from(count).map_err(|_| TerrainError::InvalidData {
            section: "cell",
            reason: format!("negative layer group count {count}"),
        })?;
        let raw_groups = reader.read_u32_array_in(e, count).section("cell")?;
        let mut groups = Vec::with_capacity(count);
        for raw in raw_groups {
            // Stored as i32; anything past i32::MAX is negative on disk.
            if raw as usize >= group_count || raw > i32::MAX as u32 {
                return Err(TerrainError::UnknownGroup {
                    index: i64::from(raw as i32),
                    len: group_count,
                });
            }
            groups.push(GroupId(raw));
        }

        let seek_table = LodSeekTable::read(reader, e)?;
        let mut lods = Vec::with_capacity(seek_table.len());
        let mut end = reader.stream_position().section("cell")?;
        for (index, entry) in seek_table.entries().iter().enumerate() {
            end = end.max(entry.span().end());
            match mode {
                LoadMode::Immediate => {
                    let mesh = load_lod_block(&seek_table, ctx, index, reader)?;
                    lods.push(LodSlot::Loaded(Arc::new(mesh)));
                }
                LoadMode::Streaming => lods.push(LodSlot::NotLoaded),
            }
        }
        reader.seek(SeekFrom::Start(end)).section("cell")?;

        trace!(x, y, lods = lods.len(), ?mode, "read cell");
        Ok(Self {
            coord,
            id,
            height,
            groups,
            seek_table,
            lods,
        })
    }

    /// Checks that [`TerrainCell::write`] has everything it needs: the
    /// height field and every LOD resident, and each group inside a table
    /// of `group_count`.
    ///
    /// # Errors
    ///
    /// The first of [`TerrainError::HeightFieldNotLoaded`],
    /// [`TerrainError::LodNotLoaded`] or [`TerrainError::UnknownGroup`].
    pub fn ensure_writable(&self, group_count: usize) -> TerrainResult<()> {
        self.height_field()?;
        if let Some(index) = self.lods.iter().position(|slot| !slot.is_loaded()) {
            return Err(TerrainError::LodNotLoaded { index });
        }
        match self.groups.iter().find(|group| group.index() >= group_count) {
            Some(group) => Err(TerrainError::UnknownGroup {
                index: i64::from(group.0),
                len: group_count,
            }),
            None => Ok(()),
        }
    }

    /// Writes the cell and rebuilds its seek table.
    ///
    /// # Errors
    ///
    /// [`TerrainError::HeightFieldNotLoaded`] or
    /// [`TerrainError::LodNotLoaded`] if anything is still on disk,
    /// [`TerrainError::UnknownGroup`] for a group outside the table, and
    /// IO or codec failures.
    pub fn write<W: Write + Seek>(
        &mut self,
        writer: &mut W,
        ctx: &FormatContext,
        group_count: usize,
    ) -> TerrainResult<()> {
        let e = ctx.endianness;
        let height_field = self.height_field()?;
        let meshes = self
            .lods
            .iter()
            .enumerate()
            .map(|(index, slot)| slot.mesh().ok_or(TerrainError::LodNotLoaded { index }))
            .collect::<TerrainResult<Vec<_>>>()?;

        writer.write_i32_in(e, self.coord.x).section("cell")?;
        writer.write_i32_in(e, self.coord.y).section("cell")?;
        writer.write_uuid(&self.id).section("cell")?;
        height_field.write(writer, ctx)?;

        let count = i32::try_from(self.groups.len()).map_err(|_| TerrainError::InvalidData {
            section: "cell",
            reason: "too many layer groups".into(),
        })?;
        writer.write_i32_in(e, count).section("cell")?;
        for group in &self.groups {
            if group.index() >= group_count {
                return Err(TerrainError::UnknownGroup {
                    index: i64::from(group.0),
                    len: group_count,
                });
            }
            writer.write_u32_in(e, group.0).section("cell")?;
        }

        let table_slot = Reservation::reserve(writer, LodSeekTable::size_for(meshes.len())).section("cell")?;
        let mut table = LodSeekTable::new();
        for mesh in &meshes {
            let span = section::write_block(writer, ctx.compression, |w| mesh.write(w, e))?;
            let offset = u32::try_from(span.offset).map_err(|_| TerrainError::InvalidData {
                section: "cell",
                reason: format!("LOD block offset {} exceeds 4 GiB", span.offset),
            })?;
            table.push(mesh.lod_level(), offset, span.size);
        }
        table_slot.patch(writer, |w| table.write(w, e))?;

        debug!(x = self.coord.x, y = self.coord.y, lods = table.len(), "wrote cell");
        self.seek_table = table;
        Ok(())
    }
}
