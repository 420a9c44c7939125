//! LOD mesh payload.
//!
//! ```text
//! lodLevel indexCount vertexCount width height rows columns   u32 × 7
//! box.min.xyz box.max.xyz                                      f32 × 6
//! sphere.center.xyz sphere.radius                              f32 × 4
//! indices                                                      u32 × indexCount
//! positions                                                    f32 × 3 × vertexCount
//! uvs                                                          f32 × 2 × vertexCount
//! normals                                                      f32 × 3 × vertexCount
//! tangents                                                     f32 × 3 × vertexCount
//! ```

use super::LodMesh;
use crate::bounds::{BoundingBox, BoundingSphere};
use crate::error::{IoContext, TerrainError, TerrainResult};
use bytemuck::Pod;
use glam::{Vec2, Vec3};
use std::io::{Read, Write};
use strata_io::{Endianness, ReadExt, WriteExt};

const SECTION: &str = "LOD mesh";

fn invalid(reason: String) -> TerrainError {
    TerrainError::InvalidData {
        section: SECTION,
        reason,
    }
}

fn read_vectors<R: Read, V: Pod>(reader: &mut R, e: Endianness, count: usize, lanes: usize) -> TerrainResult<Vec<V>> {
    let scalars = reader.read_f32_array_in(e, count * lanes).section(SECTION)?;
    bytemuck::try_cast_slice::<f32, V>(&scalars)
        .map(<[V]>::to_vec)
        .map_err(|err| invalid(format!("vector cast failed: {err}")))
}

fn read_vec3<R: Read>(reader: &mut R, e: Endianness) -> TerrainResult<Vec3> {
    let v = reader.read_f32_array_in(e, 3).section(SECTION)?;
    Ok(Vec3::new(v[0], v[1], v[2]))
}

impl LodMesh {
    /// Writes the uncompressed payload.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write<W: Write>(&self, writer: &mut W, e: Endianness) -> TerrainResult<()> {
        let header = [
            self.lod_level,
            self.indices.len() as u32,
            self.positions.len() as u32,
            self.width,
            self.height,
            self.rows,
            self.columns,
        ];
        writer.write_u32_slice_in(e, &header).section(SECTION)?;

        let bbox = &self.bounding_box;
        let sphere = &self.bounding_sphere;
        writer.write_f32_slice_in(e, &bbox.min.to_array()).section(SECTION)?;
        writer.write_f32_slice_in(e, &bbox.max.to_array()).section(SECTION)?;
        writer.write_f32_slice_in(e, &sphere.center.to_array()).section(SECTION)?;
        writer.write_f32_in(e, sphere.radius).section(SECTION)?;

        writer.write_u32_slice_in(e, &self.indices).section(SECTION)?;
        writer
            .write_f32_slice_in(e, bytemuck::cast_slice(&self.positions))
            .section(SECTION)?;
        writer
            .write_f32_slice_in(e, bytemuck::cast_slice(&self.uvs))
            .section(SECTION)?;
        writer
            .write_f32_slice_in(e, bytemuck::cast_slice(&self.normals))
            .section(SECTION)?;
        writer
            .write_f32_slice_in(e, bytemuck::cast_slice(&self.tangents))
            .section(SECTION)?;
        Ok(())
    }

    /// Reads a payload written by [`LodMesh::write`].
    ///
    /// # Errors
    ///
    /// [`TerrainError::Truncated`] on a short stream and
    /// [`TerrainError::InvalidData`] when counts disagree with the grid or
    /// an index points past the vertex array.
    pub fn read<R: Read>(reader: &mut R, e: Endianness) -> TerrainResult<Self> {
        let header = reader.read_u32_array_in(e, 7).section(SECTION)?;
        let [lod_level, index_count, vertex_count, width, height, rows, columns] =
            <[u32; 7]>::try_from(header).map_err(|_| invalid("short header".into()))?;

        let (expected_vertices, expected_indices) = Self::counts(rows, columns)?;
        if vertex_count as usize != expected_vertices || index_count as usize != expected_indices {
            return Err(invalid(format!(
                "{vertex_count} vertices / {index_count} indices for a {rows}x{columns} grid"
            )));
        }

        let bounding_box = BoundingBox::new(read_vec3(reader, e)?, read_vec3(reader, e)?);
        let center = read_vec3(reader, e)?;
        let radius = reader.read_f32_in(e).section(SECTION)?;

        let indices = reader.read_u32_array_in(e, expected_indices).section(SECTION)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(invalid(format!("index {bad} past {vertex_count} vertices")));
        }

        let positions: Vec<Vec3> = read_vectors(reader, e, expected_vertices, 3)?;
        let uvs: Vec<Vec2> = read_vectors(reader, e, expected_vertices, 2)?;
        let normals: Vec<Vec3> = read_vectors(reader, e, expected_vertices, 3)?;
        let tangents: Vec<Vec3> = read_vectors(reader, e, expected_vertices, 3)?;

        Ok(Self {
            lod_level,
            width,
            height,
            rows,
            columns,
            bounding_box,
            bounding_sphere: BoundingSphere::new(center, radius),
            indices,
            positions,
            uvs,
            normals,
            tangents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::HeightField;
    use crate::noise::{PerlinNoise, TerrainSeed};

    fn sample_mesh() -> LodMesh {
        let mut hf = HeightField::new(8, 8).unwrap();
        hf.generate_perlin(&PerlinNoise::new(TerrainSeed::new(21)), 0.0, 0.0, 0.3, 5.0);
        let mut mesh = LodMesh::new(2, 24, 24, 5, 7).unwrap();
        mesh.generate(&hf);
        mesh
    }

    #[test]
    fn test_payload_roundtrip_both_orders() {
        let mesh = sample_mesh();
        for e in [Endianness::Little, Endianness::Big] {
            let mut buf = Vec::new();
            mesh.write(&mut buf, e).unwrap();
            let expected_len = 7 * 4 + 10 * 4 + mesh.index_count() * 4 + mesh.vertex_count() * 11 * 4;
            assert_eq!(buf.len(), expected_len);
            assert_eq!(LodMesh::read(&mut buf.as_slice(), e).unwrap(), mesh);
        }
    }

    #[test]
    fn test_inconsistent_counts_rejected() {
        let mesh = sample_mesh();
        let mut buf = Vec::new();
        mesh.write(&mut buf, Endianness::Little).unwrap();
        // vertexCount lives in the third header word.
        buf[8..12].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            LodMesh::read(&mut buf.as_slice(), Endianness::Little),
            Err(TerrainError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mesh = sample_mesh();
        let mut buf = Vec::new();
        mesh.write(&mut buf, Endianness::Little).unwrap();
        let first_index = 7 * 4 + 10 * 4;
        buf[first_index..first_index + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(LodMesh::read(&mut buf.as_slice(), Endianness::Little).is_err());
    }

    #[test]
    fn test_truncated_payload() {
        let mesh = sample_mesh();
        let mut buf = Vec::new();
        mesh.write(&mut buf, Endianness::Big).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(
            LodMesh::read(&mut buf.as_slice(), Endianness::Big),
            Err(TerrainError::Truncated { .. })
        ));
    }
}
