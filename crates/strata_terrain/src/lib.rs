//! # STRATA Terrain
//!
//! Tiled terrain with precomputed levels of detail, stored in a seekable
//! container so a renderer can load exactly the mesh it needs.
//!
//! ## Pieces
//!
//! - [`HeightField`] elevation grids and [`PackedLayerMask`] blend masks
//! - [`TerrainLayerGroup`]: up to four layers blended by one mask
//! - [`LodMesh`]: tessellated grid meshes with normals, tangents and bounds,
//!   plus seam fusing and normal averaging between neighbours
//! - [`TerrainContainer`]: header, layer table, group table and cells, each
//!   cell carrying a [`LodSeekTable`] of absolute block offsets
//! - [`LodGenerator`] / [`TerrainBuilder`]: bounded parallel generation
//! - [`LodStreamer`]: prioritised, cancellable background LOD loads
//!
//! ## Rules
//!
//! 1. **Deterministic** - same config and seed produce the same bytes
//! 2. **No torn meshes** - a mesh is published only once fully parsed
//! 3. **Checked input** - every size and index read from disk is validated
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_terrain::{LoadMode, TerrainBuilder, TerrainConfig, TerrainContainer};
//!
//! let config = TerrainConfig::from_file("config/terrain.toml")?;
//! let mut world = TerrainBuilder::new(config.clone())?.build()?;
//! let mut out = std::io::Cursor::new(Vec::new());
//! world.save(&mut out, &config.output.save_options())?;
//!
//! out.set_position(0);
//! let lazy = TerrainContainer::load(&mut out, LoadMode::Streaming)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bounds;
pub mod cell;
pub mod config;
pub mod container;
pub mod error;
pub mod format;
pub mod generation;
pub mod heightfield;
pub mod layer;
pub mod lod;
pub mod mask;
pub mod noise;
pub mod scheduler;
pub mod seek_table;
pub mod streaming;

pub use bounds::{BoundingBox, BoundingSphere, Ray};
pub use cell::{CellCoord, HeightSlot, LodLocator, LodSlot, TerrainCell};
pub use config::{LayerConfig, TerrainConfig};
pub use container::{Neighbors, SaveOptions, TerrainContainer, TerrainHeader};
pub use error::{LodDims, ReadCancelled, TerrainError, TerrainResult};
pub use format::{FormatContext, LoadMode};
pub use generation::{LodGenerator, LodSettings, TerrainBuilder};
pub use heightfield::{HeightField, HeightFieldHeader};
pub use layer::{GroupId, LayerRef, TerrainLayer, TerrainLayerGroup, MAX_LAYERS_PER_GROUP};
pub use lod::{Edge, LodMesh, RayHit};
pub use mask::{LayerMask, PackedLayerMask};
pub use noise::{PerlinNoise, TerrainSeed};
pub use scheduler::{CancelToken, JobHandle, JobPriority, JobScheduler};
pub use seek_table::{LodSeekTable, SeekEntry};
pub use streaming::{ActiveLod, CancellableReader, FileSource, LodSource, LodStreamer, MemorySource, SharedSource};

pub use strata_io::{Compression, Endianness, TextEncoding};
