//! Seam operations between the border vertices of neighbouring cells.

use super::LodMesh;
use crate::error::TerrainResult;
use glam::Vec3;

/// Side of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// +Z side, last column.
    North,
    /// -Z side, first column.
    South,
    /// +X side, last row.
    East,
    /// -X side, first row.
    West,
}

impl Edge {
    /// All edges.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// The matching edge of the neighbour across this one.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// Cell coordinate step toward the neighbour across this edge.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

/// Normalised sum of two unit vectors. Equal inputs are returned untouched
/// so that re-averaging a stitched seam is exact.
#[inline]
fn blend_unit(a: Vec3, b: Vec3) -> Vec3 {
    if a == b {
        return a;
    }
    (a + b).normalize_or_zero()
}

impl LodMesh {
    /// Vertex pairs along `edge`: this mesh's border index and the
    /// neighbour's matching border index.
    fn border_pairs(&self, edge: Edge) -> Vec<(usize, usize)> {
        let last_row = self.rows - 1;
        let last_column = self.columns - 1;
        match edge {
            Edge::North => (0..self.rows)
                .map(|i| (self.index_of(i, last_column), self.index_of(i, 0)))
                .collect(),
            Edge::South => (0..self.rows)
                .map(|i| (self.index_of(i, 0), self.index_of(i, last_column)))
                .collect(),
            Edge::East => (0..self.columns)
                .map(|i| (self.index_of(last_row, i), self.index_of(0, i)))
                .collect(),
            Edge::West => (0..self.columns)
                .map(|i| (self.index_of(0, i), self.index_of(last_row, i)))
                .collect(),
        }
    }

    /// Moves both borders to their shared midpoint.
    ///
    /// Positions are cell-local, so paired border vertices already coincide
    /// in world X/Z; only elevation is averaged. Bounds of both meshes are
    /// recomputed.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodMismatch`](crate::TerrainError::LodMismatch) if the
    /// meshes differ in level, rows or columns.
    pub fn fuse_edge(&mut self, edge: Edge, other: &mut LodMesh) -> TerrainResult<()> {
        self.ensure_compatible(other)?;
        for (a, b) in self.border_pairs(edge) {
            let y = (self.positions[a].y + other.positions[b].y) * 0.5;
            self.positions[a].y = y;
            other.positions[b].y = y;
        }
        self.recompute_bounds();
        other.recompute_bounds();
        Ok(())
    }

    /// Replaces border normals and tangents on both meshes with the
    /// normalised sum of each pair.
    ///
    /// A second call with unchanged data is a no-op.
    ///
    /// # Errors
    ///
    /// [`TerrainError::LodMismatch`](crate::TerrainError::LodMismatch) if the
    /// meshes differ in level, rows or columns.
    pub fn average_edge(&mut self, edge: Edge, other: &mut LodMesh) -> TerrainResult<()> {
        self.ensure_compatible(other)?;
        for (a, b) in self.border_pairs(edge) {
            let normal = blend_unit(self.normals[a], other.normals[b]);
            let tangent = blend_unit(self.tangents[a], other.tangents[b]);
            self.normals[a] = normal;
            other.normals[b] = normal;
            self.tangents[a] = tangent;
            other.tangents[b] = tangent;
        }
        Ok(())
    }
}
