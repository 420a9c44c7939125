//! # Terrain Generation
//!
//! Builds LOD chains on a bounded worker pool and whole worlds from a
//! [`TerrainConfig`].
//!
//! Height fields of neighbouring cells sample the same noise, offset by the
//! cell coordinate, so elevations are continuous across the grid. Meshes are
//! generated per cell without looking at neighbours; seams are stitched once
//! every cell is generated.

use crate::cell::{CellCoord, TerrainCell};
use crate::config::TerrainConfig;
use crate::container::TerrainContainer;
use crate::error::{TerrainError, TerrainResult};
use crate::heightfield::HeightField;
use crate::layer::{TerrainLayer, TerrainLayerGroup};
use crate::lod::LodMesh;
use crate::noise::{PerlinNoise, TerrainSeed};
use rand::Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Grid size of each level, finest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LodSettings {
    levels: Vec<(u32, u32)>,
}

impl LodSettings {
    /// Four levels halving the tessellation each step.
    #[must_use]
    pub fn standard(base_tessellation: u32) -> Self {
        Self::halving(base_tessellation, 4)
    }

    /// `levels` levels where level `l` has `(base >> l) + 1` vertices per
    /// side, never fewer than 2.
    #[must_use]
    pub fn halving(base_tessellation: u32, levels: u32) -> Self {
        let levels = (0..levels)
            .map(|l| {
                let n = base_tessellation.checked_shr(l).unwrap_or(0).saturating_add(1).max(2);
                (n, n)
            })
            .collect();
        Self { levels }
    }

    /// Explicit `(rows, columns)` per level.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] for an empty list or a level
    /// with fewer than 2 rows or columns.
    pub fn from_levels(levels: Vec<(u32, u32)>) -> TerrainResult<Self> {
        if levels.is_empty() {
            return Err(TerrainError::InvalidDimensions {
                what: "LOD chain",
                width: 0,
                height: 0,
            });
        }
        for &(rows, columns) in &levels {
            LodMesh::counts(rows, columns)?;
        }
        Ok(Self { levels })
    }

    /// Number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True if there are no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// `(rows, columns)` per level.
    #[must_use]
    pub fn levels(&self) -> &[(u32, u32)] {
        &self.levels
    }
}

/// Generates every level of a cell in parallel.
///
/// The pool has one thread per level, so one cell never occupies more
/// threads than it has meshes.
pub struct LodGenerator {
    settings: LodSettings,
    pool: ThreadPool,
}

impl std::fmt::Debug for LodGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LodGenerator")
            .field("settings", &self.settings)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl LodGenerator {
    /// Starts the pool.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Pool`] if the threads can not be spawned.
    pub fn new(settings: LodSettings) -> TerrainResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.len().max(1))
            .thread_name(|i| format!("strata-lod-{i}"))
            .build()
            .map_err(|e| TerrainError::Pool(e.to_string()))?;
        debug!(levels = settings.len(), "started LOD generation pool");
        Ok(Self { settings, pool })
    }

    /// Level layout.
    #[must_use]
    pub const fn settings(&self) -> &LodSettings {
        &self.settings
    }

    /// Builds one mesh per level from `height_field`, finest first.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if a level's grid is invalid.
    #[allow(clippy::cast_possible_truncation)]
    pub fn generate(&self, height_field: &HeightField, width: u32, height: u32) -> TerrainResult<Vec<LodMesh>> {
        self.pool.install(|| {
            self.settings
                .levels
                .par_iter()
                .enumerate()
                .map(|(level, &(rows, columns))| {
                    let mut mesh = LodMesh::new(level as u32, width, height, rows, columns)?;
                    mesh.generate(height_field);
                    Ok(mesh)
                })
                .collect()
        })
    }
}

/// Builds a complete [`TerrainContainer`] from configuration.
#[derive(Debug)]
pub struct TerrainBuilder {
    config: TerrainConfig,
    generator: LodGenerator,
}

impl TerrainBuilder {
    /// Validates `config` and starts the generation pool.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Config`] for an invalid configuration and
    /// [`TerrainError::Pool`] if the pool fails to start.
    pub fn new(config: TerrainConfig) -> TerrainResult<Self> {
        config.validate()?;
        let settings = LodSettings::halving(config.lod.base_tessellation, config.lod.levels);
        let generator = LodGenerator::new(settings)?;
        Ok(Self { config, generator })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Synthesizes the height field of the cell at `coord`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] for a zero resolution.
    #[allow(clippy::cast_precision_loss)]
    pub fn height_field(&self, noise: &PerlinNoise, coord: CellCoord) -> TerrainResult<HeightField> {
        let world = &self.config.world;
        let n = &self.config.noise;
        let res = world.height_resolution;
        let mut hf = HeightField::new(res, res)?;

        // Border samples are shared with the neighbour.
        let stride = (res - 1) as f32;
        let ox = coord.x as f32 * stride;
        let oz = coord.y as f32 * stride;
        if n.octaves <= 1 {
            hf.generate_perlin(noise, ox, oz, n.scale, n.height_factor);
        } else {
            hf.generate_octaves(noise, ox, oz, n.scale, n.height_factor, n.octaves, n.persistence);
        }
        for _ in 0..n.smooth_passes {
            hf.smooth();
        }
        Ok(hf)
    }

    /// Generates every cell, then stitches the seams.
    ///
    /// # Errors
    ///
    /// Any generation or stitching error.
    #[allow(clippy::cast_possible_wrap)]
    pub fn build(&self) -> TerrainResult<TerrainContainer> {
        let started = Instant::now();
        let world = &self.config.world;
        let seed = TerrainSeed::new(world.seed);
        let noise = PerlinNoise::new(seed.derive(0x4E4F_4953_45));
        let mut ids = seed.derive(0x4345_4C4C).rng();

        let mut container = TerrainContainer::new();
        let layers: Vec<_> = self
            .config
            .layers
            .iter()
            .map(|l| container.add_layer(TerrainLayer::new(l.name.clone(), l.material)))
            .collect();

        for y in 0..world.grid_height as i32 {
            for x in 0..world.grid_width as i32 {
                let coord = CellCoord::new(x, y);
                let hf = self.height_field(&noise, coord)?;

                let mut group = TerrainLayerGroup::new(world.height_resolution, world.height_resolution)?;
                for layer in &layers {
                    group.add_layer(layer.clone())?;
                }
                let group = container.add_layer_group(group);

                let lods = self.generator.generate(&hf, world.cell_size, world.cell_size)?;
                let id = Uuid::from_bytes(ids.gen::<[u8; 16]>());
                let mut cell = TerrainCell::new(coord, id, hf);
                cell.add_layer_group(group);
                cell.set_lods(lods);
                container.insert_cell(cell)?;
            }
            debug!(row = y, "generated terrain row");
        }

        container.stitch_seams()?;
        info!(
            cells = container.cells().len(),
            levels = self.generator.settings().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated terrain"
        );
        Ok(container)
    }
}
