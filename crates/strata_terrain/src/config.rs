//! # Terrain Configuration
//!
//! Loaded once from TOML by the tool binary and by [`TerrainBuilder`].
//! Every section and field is optional; missing values take the defaults
//! below.
//!
//! ```toml
//! [world]
//! seed = 42
//! cell_size = 64
//! grid_width = 4
//! grid_height = 4
//! height_resolution = 65
//!
//! [noise]
//! scale = 0.02
//! height_factor = 10.0
//! octaves = 4
//! persistence = 0.5
//! smooth_passes = 1
//!
//! [lod]
//! base_tessellation = 64
//! levels = 4
//!
//! [output]
//! compression = "lz4"
//! endianness = "little"
//! encoding = "utf8"
//!
//! [streaming]
//! workers = 2
//!
//! [[layers]]
//! name = "grass"
//! material = "6c1e0b2a-2f4d-4c59-9a57-0d3e5f1b7a10"
//! ```
//!
//! [`TerrainBuilder`]: crate::generation::TerrainBuilder

use crate::container::SaveOptions;
use crate::error::{TerrainError, TerrainResult};
use crate::heightfield::{DEFAULT_HEIGHT_FACTOR, DEFAULT_NOISE_SCALE};
use crate::layer::MAX_LAYERS_PER_GROUP;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_io::{Compression, Endianness, TextEncoding};
use uuid::Uuid;

/// World layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Noise and material seed.
    pub seed: u64,
    /// Cell side length in world units.
    pub cell_size: u32,
    /// Cells along X.
    pub grid_width: u32,
    /// Cells along Z.
    pub grid_height: u32,
    /// Height samples per cell side.
    pub height_resolution: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            cell_size: 64,
            grid_width: 2,
            grid_height: 2,
            height_resolution: 65,
        }
    }
}

/// Height field synthesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Sample position multiplier.
    pub scale: f32,
    /// Output elevation multiplier.
    pub height_factor: f32,
    /// Octave count; 1 is plain Perlin.
    pub octaves: u32,
    /// Amplitude ratio between successive octaves.
    pub persistence: f32,
    /// Box filter passes after synthesis.
    pub smooth_passes: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_NOISE_SCALE,
            height_factor: DEFAULT_HEIGHT_FACTOR,
            octaves: 1,
            persistence: 0.5,
            smooth_passes: 0,
        }
    }
}

/// LOD chain shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Quads per side at level 0.
    pub base_tessellation: u32,
    /// Number of levels.
    pub levels: u32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            base_tessellation: 32,
            levels: 4,
        }
    }
}

/// Container encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Section compression.
    pub compression: Compression,
    /// Byte order.
    pub endianness: Endianness,
    /// String encoding.
    pub encoding: TextEncoding,
}

impl OutputConfig {
    /// Options for [`TerrainContainer::save`](crate::TerrainContainer::save).
    #[must_use]
    pub const fn save_options(&self) -> SaveOptions {
        SaveOptions {
            encoding: self.encoding,
            endianness: self.endianness,
            compression: self.compression,
        }
    }
}

/// Background loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Worker threads in the job scheduler.
    pub workers: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// One texture layer applied to every generated cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Display name.
    pub name: String,
    /// Material asset id.
    #[serde(default)]
    pub material: Uuid,
}

fn default_layers() -> Vec<LayerConfig> {
    vec![LayerConfig {
        name: "base".to_owned(),
        material: Uuid::nil(),
    }]
}

/// Complete terrain configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// World layout.
    pub world: WorldConfig,
    /// Height synthesis.
    pub noise: NoiseConfig,
    /// LOD chain.
    pub lod: LodConfig,
    /// Encoding.
    pub output: OutputConfig,
    /// Background loading.
    pub streaming: StreamingConfig,
    /// Layers of the default group, in slot order. The first one is opaque.
    #[serde(default = "default_layers")]
    pub layers: Vec<LayerConfig>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            noise: NoiseConfig::default(),
            lod: LodConfig::default(),
            output: OutputConfig::default(),
            streaming: StreamingConfig::default(),
            layers: default_layers(),
        }
    }
}

impl TerrainConfig {
    /// Large world with fine meshes, as shipped.
    #[must_use]
    pub fn production() -> Self {
        Self {
            world: WorldConfig {
                seed: 0x5EED,
                cell_size: 128,
                grid_width: 8,
                grid_height: 8,
                height_resolution: 129,
            },
            noise: NoiseConfig {
                scale: 0.01,
                height_factor: 40.0,
                octaves: 5,
                persistence: 0.5,
                smooth_passes: 2,
            },
            lod: LodConfig {
                base_tessellation: 128,
                levels: 5,
            },
            output: OutputConfig::default(),
            streaming: StreamingConfig { workers: 4 },
            layers: ["rock", "grass", "dirt", "snow"]
                .iter()
                .enumerate()
                .map(|(i, name)| LayerConfig {
                    name: (*name).to_owned(),
                    material: Uuid::from_u128(0x5EED_0000 + i as u128),
                })
                .collect(),
        }
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Config`] on a parse or validation failure.
    pub fn from_toml_str(text: &str) -> TerrainResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TerrainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Config`] if the file can not be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TerrainError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> TerrainResult<String> {
        toml::to_string_pretty(self).map_err(|e| TerrainError::Config(e.to_string()))
    }

    /// Checks ranges that would otherwise fail deep inside generation.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Config`] naming the first bad field.
    pub fn validate(&self) -> TerrainResult<()> {
        let fail = |msg: &str| Err(TerrainError::Config(msg.to_owned()));
        let w = &self.world;
        if w.cell_size == 0 {
            return fail("world.cell_size must be positive");
        }
        if w.grid_width == 0 || w.grid_height == 0 {
            return fail("world.grid_width and world.grid_height must be positive");
        }
        if i32::try_from(w.grid_width).is_err() || i32::try_from(w.grid_height).is_err() {
            return fail("world grid exceeds i32 cell coordinates");
        }
        if w.height_resolution < 2 {
            return fail("world.height_resolution must be at least 2");
        }
        let n = &self.noise;
        if !(n.scale.is_finite() && n.scale > 0.0) {
            return fail("noise.scale must be a positive number");
        }
        if !n.height_factor.is_finite() {
            return fail("noise.height_factor must be finite");
        }
        if n.octaves == 0 || n.octaves > 16 {
            return fail("noise.octaves must be within 1..=16");
        }
        if !(n.persistence.is_finite() && n.persistence > 0.0) {
            return fail("noise.persistence must be a positive number");
        }
        if self.lod.levels == 0 || self.lod.levels > 16 {
            return fail("lod.levels must be within 1..=16");
        }
        if self.lod.base_tessellation == 0 || self.lod.base_tessellation > 4096 {
            return fail("lod.base_tessellation must be within 1..=4096");
        }
        if self.streaming.workers == 0 {
            return fail("streaming.workers must be positive");
        }
        if self.layers.is_empty() || self.layers.len() > MAX_LAYERS_PER_GROUP {
            return fail("layers must list between 1 and 4 entries");
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if self.layers[..i].iter().any(|l| l.name == layer.name) {
                return Err(TerrainError::Config(format!("duplicate layer '{}'", layer.name)));
            }
        }
        Ok(())
    }
}
