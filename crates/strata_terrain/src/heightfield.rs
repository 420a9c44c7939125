//! # Height Fields
//!
//! Dense row-major elevation grids, one per terrain cell.
//!
//! ## Storage
//!
//! ```text
//! width:u32 height:u32 payloadSize:u32 [compressed f32 × width*height]
//! ```
//!
//! The payload is preceded by its compressed size so streaming loads can
//! skip it and come back later.

use crate::error::{IoContext, TerrainError, TerrainResult};
use crate::format::FormatContext;
use crate::noise::PerlinNoise;
use rand::Rng;
use std::io::{Read, Seek, Write};
use strata_io::{section, Compression, Endianness, ReadExt, SectionSpan, WriteExt};

/// Default multiplier applied to normalised fills.
pub const DEFAULT_HEIGHT_FACTOR: f32 = 10.0;

/// Default noise frequency for Perlin fills.
pub const DEFAULT_NOISE_SCALE: f32 = 0.02;

/// Row-major grid of elevation samples.
///
/// Invariant: `data.len() == width * height`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl HeightField {
    /// Creates a zero-filled field.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0.
    pub fn new(width: u32, height: u32) -> TerrainResult<Self> {
        let len = Self::checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0.0; len],
        })
    }

    /// Wraps existing samples.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0 or `data`
    /// does not hold exactly `width * height` samples.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> TerrainResult<Self> {
        let len = Self::checked_len(width, height)?;
        if data.len() != len {
            return Err(TerrainError::InvalidData {
                section: "height field",
                reason: format!("{} samples for a {width}x{height} grid", data.len()),
            });
        }
        Ok(Self { width, height, data })
    }

    fn checked_len(width: u32, height: u32) -> TerrainResult<usize> {
        if width == 0 || height == 0 {
            return Err(TerrainError::InvalidDimensions {
                what: "height field",
                width,
                height,
            });
        }
        Ok(width as usize * height as usize)
    }

    /// Samples along x.
    #[must_use]
    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Samples along y.
    #[must_use]
    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// All samples, row-major.
    #[must_use]
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable samples. The length can not change.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> TerrainResult<usize> {
        if x >= self.width || y >= self.height {
            return Err(TerrainError::OutOfBounds {
                what: "height field",
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Sample at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`] outside the grid.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> TerrainResult<f32> {
        Ok(self.data[self.index(x, y)?])
    }

    /// Overwrites the sample at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`] outside the grid.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) -> TerrainResult<()> {
        let i = self.index(x, y)?;
        self.data[i] = value;
        Ok(())
    }

    /// Sample at `(x, y)` with both coordinates clamped into the grid.
    #[must_use]
    #[inline]
    pub fn sample_clamped(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    /// Lowest and highest sample.
    #[must_use]
    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }

    /// Sets every sample to 0.
    pub fn generate_empty(&mut self) {
        self.data.fill(0.0);
    }

    /// Fills with `uniform[0, 1) * height_factor`.
    pub fn generate_random<R: Rng + ?Sized>(&mut self, rng: &mut R, height_factor: f32) {
        for h in &mut self.data {
            *h = rng.gen::<f32>() * height_factor;
        }
    }

    /// Fills from Perlin noise remapped to `[0, 1]` and scaled.
    ///
    /// # Arguments
    ///
    /// * `offset_x`, `offset_z` - World-space sample offset of this grid
    /// * `scale` - Noise frequency ([`DEFAULT_NOISE_SCALE`])
    /// * `height_factor` - Output multiplier ([`DEFAULT_HEIGHT_FACTOR`])
    #[allow(clippy::cast_precision_loss)]
    pub fn generate_perlin(
        &mut self,
        noise: &PerlinNoise,
        offset_x: f32,
        offset_z: f32,
        scale: f32,
        height_factor: f32,
    ) {
        let width = self.width as usize;
        for (i, h) in self.data.iter_mut().enumerate() {
            let x = (i % width) as f32;
            let z = (i / width) as f32;
            let n = noise.sample(scale * (x + offset_x), scale * (z + offset_z));
            *h = (n * 0.5 + 0.5) * height_factor;
        }
    }

    /// Like [`HeightField::generate_perlin`] with fractal octaves.
    #[allow(clippy::cast_precision_loss, clippy::too_many_arguments)]
    pub fn generate_octaves(
        &mut self,
        noise: &PerlinNoise,
        offset_x: f32,
        offset_z: f32,
        scale: f32,
        height_factor: f32,
        octaves: u32,
        persistence: f32,
    ) {
        let width = self.width as usize;
        for (i, h) in self.data.iter_mut().enumerate() {
            let x = (i % width) as f32;
            let z = (i / width) as f32;
            let n = noise.octave(scale * (x + offset_x), scale * (z + offset_z), octaves, persistence);
            *h = (n * 0.5 + 0.5) * height_factor;
        }
    }

    /// 3x3 box blur. Neighbours outside the grid are left out of the mean.
    ///
    /// Reads only the previous samples; the result replaces the buffer at the end.
    #[allow(clippy::cast_precision_loss)]
    pub fn smooth(&mut self) {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = vec![0.0f32; self.data.len()];

        for y in 0..h {
            for x in 0..w {
                let mut sum = 0.0;
                let mut count = 0u32;
                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        sum += self.data[ny * w + nx];
                        count += 1;
                    }
                }
                out[y * w + x] = sum / count as f32;
            }
        }

        self.data = out;
    }

    /// Writes dimensions, size prefix and compressed samples.
    ///
    /// # Errors
    ///
    /// Propagates IO and codec failures.
    pub fn write<W: Write + Seek>(&self, writer: &mut W, ctx: &FormatContext) -> TerrainResult<()> {
        let e = ctx.endianness;
        writer.write_u32_in(e, self.width).section("height field")?;
        writer.write_u32_in(e, self.height).section("height field")?;
        section::write_section::<_, std::io::Error, _>(writer, e, ctx.compression, |w| {
            w.write_f32_slice_in(e, &self.data)
        })
        .section("height field")?;
        Ok(())
    }

    /// Reads dimensions and the payload span, leaving the reader at the
    /// payload start.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Truncated`] on a short stream.
    pub fn read_header<R: Read + Seek>(reader: &mut R, endianness: Endianness) -> TerrainResult<HeightFieldHeader> {
        let width = reader.read_u32_in(endianness).section("height field")?;
        let height = reader.read_u32_in(endianness).section("height field")?;
        Self::checked_len(width, height)?;
        let span = section::read_section_header(reader, endianness).section("height field")?;
        Ok(HeightFieldHeader { width, height, span })
    }

    /// Reads a complete height field.
    ///
    /// # Errors
    ///
    /// Format, truncation and codec errors.
    pub fn read<R: Read + Seek>(reader: &mut R, ctx: &FormatContext) -> TerrainResult<Self> {
        Self::read_header(reader, ctx.endianness)?.load(reader, ctx.endianness, ctx.compression)
    }
}

/// Dimensions and payload location of a height field on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeightFieldHeader {
    /// Samples along x.
    pub width: u32,
    /// Samples along y.
    pub height: u32,
    /// Compressed payload.
    pub span: SectionSpan,
}

impl HeightFieldHeader {
    /// Decompresses the payload and leaves the reader after it.
    ///
    /// # Errors
    ///
    /// Truncation and codec errors.
    pub fn load<R: Read + Seek>(
        &self,
        reader: &mut R,
        endianness: Endianness,
        compression: Compression,
    ) -> TerrainResult<HeightField> {
        let len = self.width as usize * self.height as usize;
        let data = section::read_block::<_, _, std::io::Error, _>(reader, self.span, compression, |r| {
            r.read_f32_array_in(endianness, len)
        })
        .section("height field")?;
        HeightField::from_data(self.width, self.height, data)
    }
}
