//! # LOD Meshes
//!
//! One tessellated grid mesh per level of detail, generated from a cell's
//! [`HeightField`].
//!
//! ## Grid layout
//!
//! Vertices form `rows × columns`, stored column-major:
//! `index(row, column) = column * rows + row`. The row index runs along
//! local +X and the column index along local +Z:
//!
//! ```text
//!        +Z (column)
//!        ▲
//!  c=2   ● ─ ● ─ ●
//!        │ ╲ │ ╲ │
//!  c=1   ● ─ ● ─ ●
//!        │ ╲ │ ╲ │
//!  c=0   ● ─ ● ─ ● ──► +X (row)
//!       r=0 r=1 r=2
//! ```
//!
//! Level 0 is the finest mesh.

mod codec;
mod edge;
pub mod shading;

pub use edge::Edge;

use crate::bounds::{BoundingBox, BoundingSphere, Ray};
use crate::error::{LodDims, TerrainError, TerrainResult};
use crate::heightfield::HeightField;
use glam::{Vec2, Vec3};

/// Closest intersection of a ray with a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit.
    pub distance: f32,
    /// Hit position in mesh space.
    pub point: Vec3,
    /// Index of the hit triangle.
    pub triangle: usize,
}

/// A generated terrain mesh at one level of detail.
///
/// Invariants: `positions`, `uvs`, `normals` and `tangents` all hold
/// `rows * columns` entries, and `indices` holds
/// `(rows - 1) * (columns - 1) * 6`.
#[derive(Clone, Debug, PartialEq)]
pub struct LodMesh {
    lod_level: u32,
    width: u32,
    height: u32,
    rows: u32,
    columns: u32,
    bounding_box: BoundingBox,
    bounding_sphere: BoundingSphere,
    indices: Vec<u32>,
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    tangents: Vec<Vec3>,
}

impl LodMesh {
    /// Creates a flat mesh with topology and UVs in place.
    ///
    /// # Arguments
    ///
    /// * `lod_level` - Detail level, 0 = finest
    /// * `width`, `height` - Cell size in world units along X and Z
    /// * `rows`, `columns` - Vertex counts along X and Z (each at least 2)
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] for fewer than 2 rows or columns
    /// or a grid whose index count overflows `u32`.
    pub fn new(lod_level: u32, width: u32, height: u32, rows: u32, columns: u32) -> TerrainResult<Self> {
        let (vertex_count, _) = Self::counts(rows, columns)?;
        let mut mesh = Self {
            lod_level,
            width,
            height,
            rows,
            columns,
            bounding_box: BoundingBox::default(),
            bounding_sphere: BoundingSphere::default(),
            indices: Vec::new(),
            positions: vec![Vec3::ZERO; vertex_count],
            uvs: vec![Vec2::ZERO; vertex_count],
            normals: vec![Vec3::Y; vertex_count],
            tangents: vec![Vec3::X; vertex_count],
        };
        mesh.generate_indices_and_uvs();
        mesh.place_flat();
        Ok(mesh)
    }

    /// Vertex and index counts for a grid.
    pub(crate) fn counts(rows: u32, columns: u32) -> TerrainResult<(usize, usize)> {
        let invalid = || TerrainError::InvalidDimensions {
            what: "LOD mesh",
            width: rows,
            height: columns,
        };
        if rows < 2 || columns < 2 {
            return Err(invalid());
        }
        let vertices = rows.checked_mul(columns).ok_or_else(invalid)?;
        let indices = (rows - 1)
            .checked_mul(columns - 1)
            .and_then(|q| q.checked_mul(6))
            .ok_or_else(invalid)?;
        Ok((vertices as usize, indices as usize))
    }

    /// Detail level.
    #[must_use]
    #[inline]
    pub const fn lod_level(&self) -> u32 {
        self.lod_level
    }

    /// Cell size along X.
    #[must_use]
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Cell size along Z.
    #[must_use]
    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Vertices along X.
    #[must_use]
    #[inline]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Vertices along Z.
    #[must_use]
    #[inline]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Level and grid size, for compatibility checks.
    #[must_use]
    #[inline]
    pub const fn dims(&self) -> LodDims {
        LodDims {
            lod_level: self.lod_level,
            rows: self.rows,
            columns: self.columns,
        }
    }

    /// `rows * columns`.
    #[must_use]
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// `(rows - 1) * (columns - 1) * 6`.
    #[must_use]
    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Axis-aligned bounds.
    #[must_use]
    #[inline]
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Sphere around [`LodMesh::bounding_box`].
    #[must_use]
    #[inline]
    pub const fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding_sphere
    }

    /// Triangle list.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Texture coordinates.
    #[must_use]
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    /// Unit vertex normals.
    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Unit vertex tangents.
    #[must_use]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    /// Vertex index of `(row, column)`.
    #[must_use]
    #[inline]
    pub const fn index_of(&self, row: u32, column: u32) -> usize {
        column as usize * self.rows as usize + row as usize
    }

    #[allow(clippy::cast_precision_loss)]
    fn target_scale(&self) -> f32 {
        self.width as f32 / (self.rows - 1) as f32
    }

    #[allow(clippy::cast_precision_loss)]
    fn place_flat(&mut self) {
        let scale = self.target_scale();
        for column in 0..self.columns {
            for row in 0..self.rows {
                let i = self.index_of(row, column);
                self.positions[i] = Vec3::new(row as f32 * scale, 0.0, column as f32 * scale);
            }
        }
        self.recompute_bounds();
    }

    /// Samples `height_field` into vertex heights, then recomputes bounds,
    /// normals and tangents.
    ///
    /// Rows run along local X and sample the field's x axis; columns run
    /// along local Z and sample its y axis. Vertex `(row, column)` sits at
    /// `(row * s, h, column * s)` with `s = width / (rows - 1)` on both
    /// axes, and reads the nearest-lower texel
    /// `(floor(row * hf.width / rows), floor(column * hf.height / columns))`,
    /// clamped into the field.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn generate(&mut self, height_field: &HeightField) {
        let scale = self.target_scale();
        let step_x = height_field.width() as f32 / self.rows as f32;
        let step_z = height_field.height() as f32 / self.columns as f32;

        for column in 0..self.columns {
            let hz = (column as f32 * step_z).floor() as u32;
            for row in 0..self.rows {
                let hx = (row as f32 * step_x).floor() as u32;
                let h = height_field.sample_clamped(hx, hz);
                let i = self.index_of(row, column);
                self.positions[i] = Vec3::new(row as f32 * scale, h, column as f32 * scale);
            }
        }

        self.recompute_bounds();
        self.recompute_shading();
    }

    /// Rebuilds the triangle list and UVs. Independent of heights.
    ///
    /// Each quad becomes two triangles wound so face normals point +Y.
    /// UVs tile once per quad with V flipped: vertex `(row, column)` maps to
    /// `(row, rows - 1 - column) * width / (rows - 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn generate_indices_and_uvs(&mut self) {
        let rows = self.rows;
        let columns = self.columns;
        let texel = self.target_scale();

        self.indices.clear();
        self.indices
            .reserve((rows as usize - 1) * (columns as usize - 1) * 6);
        for i in 0..columns - 1 {
            for j in 0..rows - 1 {
                let a = i * rows + j;
                let b = (i + 1) * rows + j;
                self.indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
            }
        }

        let flip = rows as f32 - 1.0;
        for column in 0..columns {
            for row in 0..rows {
                let i = self.index_of(row, column);
                self.uvs[i] = Vec2::new(row as f32, flip - column as f32) * texel;
            }
        }
    }

    /// Recomputes the box and sphere from current positions.
    ///
    /// The box spans the full cell footprint `(0, min_y, 0)..(width, max_y, height)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn recompute_bounds(&mut self) {
        let (min_y, max_y) = self
            .positions
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        self.bounding_box = BoundingBox::new(
            Vec3::new(0.0, min_y, 0.0),
            Vec3::new(self.width as f32, max_y, self.height as f32),
        );
        self.bounding_sphere = BoundingSphere::from_box(&self.bounding_box);
    }

    /// Recomputes normals and tangents from positions, UVs and indices.
    pub fn recompute_shading(&mut self) {
        let adjacency = shading::VertexFaces::build(&self.indices, self.positions.len());
        self.normals = shading::compute_normals(&self.positions, &self.indices, &adjacency);
        self.tangents =
            shading::compute_tangents(&self.positions, &self.uvs, &self.indices, &adjacency);
    }

    /// Closest intersection of `ray` with the mesh.
    ///
    /// Rejects with the bounding box first, then tests every triangle and
    /// keeps the smallest ray parameter.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<RayHit> {
        self.bounding_box.intersect_ray(ray)?;

        let mut best: Option<RayHit> = None;
        for (triangle, tri) in self.indices.chunks_exact(3).enumerate() {
            let v0 = self.positions[tri[0] as usize];
            let v1 = self.positions[tri[1] as usize];
            let v2 = self.positions[tri[2] as usize];
            if let Some(t) = ray.intersect_triangle(v0, v1, v2) {
                if best.map_or(true, |b| t < b.distance) {
                    best = Some(RayHit {
                        distance: t,
                        point: ray.at(t),
                        triangle,
                    });
                }
            }
        }
        best
    }

    fn ensure_compatible(&self, other: &Self) -> TerrainResult<()> {
        if self.dims() != other.dims() {
            return Err(TerrainError::LodMismatch {
                a: self.dims(),
                b: other.dims(),
            });
        }
        Ok(())
    }
}
