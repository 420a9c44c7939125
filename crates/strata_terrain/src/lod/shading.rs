//! Vertex normals and tangents.
//!
//! Face terms are computed in parallel, then every vertex sums the faces
//! that touch it. No output depends on another output, so both passes run
//! on the rayon pool without locking.

use glam::{Vec2, Vec3};
use rayon::prelude::*;

/// Faces incident to each vertex, in compressed row form.
#[derive(Clone, Debug, Default)]
pub struct VertexFaces {
    offsets: Vec<u32>,
    faces: Vec<u32>,
}

impl VertexFaces {
    /// Builds the adjacency of a triangle list.
    ///
    /// Every index must be below `vertex_count`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(indices: &[u32], vertex_count: usize) -> Self {
        let mut offsets = vec![0u32; vertex_count + 1];
        for &i in indices {
            offsets[i as usize + 1] += 1;
        }
        for v in 0..vertex_count {
            offsets[v + 1] += offsets[v];
        }

        let mut cursor: Vec<u32> = offsets[..vertex_count].to_vec();
        let mut faces = vec![0u32; indices.len()];
        for (face, tri) in indices.chunks_exact(3).enumerate() {
            for &v in tri {
                let slot = &mut cursor[v as usize];
                faces[*slot as usize] = face as u32;
                *slot += 1;
            }
        }

        Self { offsets, faces }
    }

    /// Faces touching vertex `v`.
    #[must_use]
    #[inline]
    pub fn faces_of(&self, v: usize) -> &[u32] {
        &self.faces[self.offsets[v] as usize..self.offsets[v + 1] as usize]
    }
}

fn corners<T: Copy>(data: &[T], tri: &[u32]) -> (T, T, T) {
    (data[tri[0] as usize], data[tri[1] as usize], data[tri[2] as usize])
}

/// Area-weighted vertex normals. Vertices with no area fall back to +Y.
#[must_use]
pub fn compute_normals(positions: &[Vec3], indices: &[u32], adjacency: &VertexFaces) -> Vec<Vec3> {
    let face_normals: Vec<Vec3> = indices
        .par_chunks_exact(3)
        .map(|tri| {
            let (p0, p1, p2) = corners(positions, tri);
            (p1 - p0).cross(p2 - p0)
        })
        .collect();

    (0..positions.len())
        .into_par_iter()
        .map(|v| {
            adjacency
                .faces_of(v)
                .iter()
                .fold(Vec3::ZERO, |acc, &f| acc + face_normals[f as usize])
                .try_normalize()
                .unwrap_or(Vec3::Y)
        })
        .collect()
}

/// Tangent of one triangle from its UV derivatives, unnormalised.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn face_tangent(p: (Vec3, Vec3, Vec3), uv: (Vec2, Vec2, Vec2)) -> Vec3 {
    let e1 = p.1 - p.0;
    let e2 = p.2 - p.0;
    let s = uv.1 - uv.0;
    let t = uv.2 - uv.0;

    let dir = if t.x * s.y - t.y * s.x < 0.0 { -1.0 } else { 1.0 };
    let (s, t) = if s.x * t.y == s.y * t.x {
        (Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0))
    } else {
        (s, t)
    };

    (e2 * s.y - e1 * t.y) * dir
}

/// Vertex tangents from UV-space derivatives. Falls back to +X.
#[must_use]
pub fn compute_tangents(
    positions: &[Vec3],
    uvs: &[Vec2],
    indices: &[u32],
    adjacency: &VertexFaces,
) -> Vec<Vec3> {
    let face_tangents: Vec<Vec3> = indices
        .par_chunks_exact(3)
        .map(|tri| face_tangent(corners(positions, tri), corners(uvs, tri)))
        .collect();

    (0..positions.len())
        .into_par_iter()
        .map(|v| {
            adjacency
                .faces_of(v)
                .iter()
                .fold(Vec3::ZERO, |acc, &f| acc + face_tangents[f as usize])
                .try_normalize()
                .unwrap_or(Vec3::X)
        })
        .collect()
}
