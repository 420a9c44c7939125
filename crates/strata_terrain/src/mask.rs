//! # Layer Blend Masks
//!
//! Per-texel weights for the four layers of a [`TerrainLayerGroup`].
//!
//! Two storage variants:
//! - [`LayerMask`]: four `u16` channels per texel, texel `(x, y)` at
//!   `data[(y * width + x) * 4..][..4]`
//! - [`PackedLayerMask`]: one `u64` per texel, channel `i` in bits
//!   `16*i..16*i+16`
//!
//! Encoding is `round(clamp01(c) * 65535)`, decoding `v / 65535`, so a
//! decode/encode pair is exact on the 16-bit grid.
//!
//! [`TerrainLayerGroup`]: crate::layer::TerrainLayerGroup

use crate::error::{IoContext, TerrainError, TerrainResult};
use crate::format::FormatContext;
use glam::{Vec2, Vec4};
use std::io::{Read, Seek, Write};
use strata_io::{section, Endianness, ReadExt, WriteExt};

/// Channels per texel.
pub const CHANNELS: usize = 4;

const UNORM16_MAX: f32 = 65535.0;

/// Quantises a weight to 16 bits with rounding.
#[must_use]
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_channel(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * UNORM16_MAX).round() as u16
}

/// Expands a 16-bit weight.
#[must_use]
#[inline]
pub fn decode_channel(value: u16) -> f32 {
    f32::from(value) / UNORM16_MAX
}

/// Packs four weights into one word.
#[must_use]
#[inline]
pub fn encode_pixel(weights: Vec4) -> u64 {
    weights
        .to_array()
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &w)| acc | u64::from(encode_channel(w)) << (16 * i))
}

/// Unpacks a word produced by [`encode_pixel`].
#[must_use]
#[inline]
pub fn decode_pixel(packed: u64) -> Vec4 {
    let channel = |i: u32| decode_channel(((packed >> (16 * i)) & 0xFFFF) as u16);
    Vec4::new(channel(0), channel(1), channel(2), channel(3))
}

fn check_dims(what: &'static str, width: u32, height: u32) -> TerrainResult<usize> {
    if width == 0 || height == 0 {
        return Err(TerrainError::InvalidDimensions { what, width, height });
    }
    Ok(width as usize * height as usize)
}

fn check_channel(channel: usize) -> TerrainResult<()> {
    if channel >= CHANNELS {
        return Err(TerrainError::SlotOutOfRange {
            index: channel,
            capacity: CHANNELS,
        });
    }
    Ok(())
}

/// Mask with four unpacked 16-bit channels per texel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerMask {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl LayerMask {
    /// Creates a mask with every channel at 0.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0.
    pub fn new(width: u32, height: u32) -> TerrainResult<Self> {
        let texels = check_dims("layer mask", width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; texels * CHANNELS],
        })
    }

    /// Texels along x.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Texels along y.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw channel data.
    #[must_use]
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    fn texel_offset(&self, x: u32, y: u32) -> TerrainResult<usize> {
        if x >= self.width || y >= self.height {
            return Err(TerrainError::OutOfBounds {
                what: "layer mask",
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    /// Raw 16-bit value of one channel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`] or [`TerrainError::SlotOutOfRange`].
    pub fn get(&self, x: u32, y: u32, channel: usize) -> TerrainResult<u16> {
        check_channel(channel)?;
        Ok(self.data[self.texel_offset(x, y)? + channel])
    }

    /// Sets the raw 16-bit value of one channel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`] or [`TerrainError::SlotOutOfRange`].
    pub fn set(&mut self, x: u32, y: u32, channel: usize, value: u16) -> TerrainResult<()> {
        check_channel(channel)?;
        let offset = self.texel_offset(x, y)?;
        self.data[offset + channel] = value;
        Ok(())
    }

    /// Normalised weights of one texel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`].
    pub fn weights(&self, x: u32, y: u32) -> TerrainResult<Vec4> {
        let o = self.texel_offset(x, y)?;
        let c = &self.data[o..o + CHANNELS];
        Ok(Vec4::new(
            decode_channel(c[0]),
            decode_channel(c[1]),
            decode_channel(c[2]),
            decode_channel(c[3]),
        ))
    }

    /// Converts to the packed representation.
    #[must_use]
    pub fn to_packed(&self) -> PackedLayerMask {
        let data = self
            .data
            .chunks_exact(CHANNELS)
            .map(|c| {
                c.iter()
                    .enumerate()
                    .fold(0u64, |acc, (i, &v)| acc | u64::from(v) << (16 * i))
            })
            .collect();
        PackedLayerMask {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Converts from the packed representation.
    #[must_use]
    pub fn from_packed(packed: &PackedLayerMask) -> Self {
        let data = packed
            .data
            .iter()
            .flat_map(|&p| (0..CHANNELS).map(move |i| ((p >> (16 * i)) & 0xFFFF) as u16))
            .collect();
        Self {
            width: packed.width,
            height: packed.height,
            data,
        }
    }

    /// Writes `width:u32 height:u32` and the uncompressed channel data.
    ///
    /// # Errors
    ///
    /// Propagates IO failures.
    pub fn write<W: Write>(&self, writer: &mut W, endianness: Endianness) -> TerrainResult<()> {
        writer.write_u32_in(endianness, self.width).section("layer mask")?;
        writer.write_u32_in(endianness, self.height).section("layer mask")?;
        writer
            .write_u16_slice_in(endianness, &self.data)
            .section("layer mask")?;
        Ok(())
    }

    /// Reads data written by [`LayerMask::write`].
    ///
    /// # Errors
    ///
    /// Truncation or invalid dimensions.
    pub fn read<R: Read>(reader: &mut R, endianness: Endianness) -> TerrainResult<Self> {
        let width = reader.read_u32_in(endianness).section("layer mask")?;
        let height = reader.read_u32_in(endianness).section("layer mask")?;
        let texels = check_dims("layer mask", width, height)?;
        let data = reader
            .read_u16_array_in(endianness, texels * CHANNELS)
            .section("layer mask")?;
        Ok(Self { width, height, data })
    }
}

/// Mask storing each texel's four channels in one `u64`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedLayerMask {
    width: u32,
    height: u32,
    data: Vec<u64>,
}

impl PackedLayerMask {
    /// Creates a mask with every channel at 0.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0.
    pub fn new(width: u32, height: u32) -> TerrainResult<Self> {
        Self::filled(width, height, Vec4::ZERO)
    }

    /// Creates a mask fully covered by the first layer.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0.
    pub fn opaque(width: u32, height: u32) -> TerrainResult<Self> {
        Self::filled(width, height, Vec4::X)
    }

    /// Creates a mask with every texel set to `weights`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidDimensions`] if either side is 0.
    pub fn filled(width: u32, height: u32, weights: Vec4) -> TerrainResult<Self> {
        let texels = check_dims("packed layer mask", width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![encode_pixel(weights); texels],
        })
    }

    /// Wraps raw packed texels.
    ///
    /// # Errors
    ///
    /// [`TerrainError::InvalidData`] if the length does not match.
    pub fn from_data(width: u32, height: u32, data: Vec<u64>) -> TerrainResult<Self> {
        let texels = check_dims("packed layer mask", width, height)?;
        if data.len() != texels {
            return Err(TerrainError::InvalidData {
                section: "layer mask",
                reason: format!("{} texels for a {width}x{height} mask", data.len()),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Texels along x.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Texels along y.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Packed texels.
    #[must_use]
    pub fn data(&self) -> &[u64] {
        &self.data
    }

    /// Packed texels as raw bytes in native order, for texture upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    fn index(&self, x: u32, y: u32) -> TerrainResult<usize> {
        if x >= self.width || y >= self.height {
            return Err(TerrainError::OutOfBounds {
                what: "packed layer mask",
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Decoded weights of one texel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`].
    pub fn pixel(&self, x: u32, y: u32) -> TerrainResult<Vec4> {
        Ok(decode_pixel(self.data[self.index(x, y)?]))
    }

    /// Encodes and stores the weights of one texel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::OutOfBounds`].
    pub fn set_pixel(&mut self, x: u32, y: u32, weights: Vec4) -> TerrainResult<()> {
        let i = self.index(x, y)?;
        self.data[i] = encode_pixel(weights);
        Ok(())
    }

    /// Number of texels with a non-zero weight, per channel.
    #[must_use]
    pub fn channel_occupation(&self) -> [u32; CHANNELS] {
        let mut counts = [0u32; CHANNELS];
        for &p in &self.data {
            for (i, count) in counts.iter_mut().enumerate() {
                if (p >> (16 * i)) & 0xFFFF != 0 {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Copies channel `source` into `destination` and zeroes `source`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::SlotOutOfRange`] for a channel past 3.
    pub fn move_channel(&mut self, source: usize, destination: usize) -> TerrainResult<()> {
        check_channel(source)?;
        check_channel(destination)?;
        if source == destination {
            return Ok(());
        }
        let (s, d) = (16 * source, 16 * destination);
        for p in &mut self.data {
            let value = (*p >> s) & 0xFFFF;
            *p &= !(0xFFFF << d);
            *p &= !(0xFFFF << s);
            *p |= value << d;
        }
        Ok(())
    }

    /// Zeroes one channel.
    ///
    /// # Errors
    ///
    /// [`TerrainError::SlotOutOfRange`] for a channel past 3.
    pub fn clear_channel(&mut self, channel: usize) -> TerrainResult<()> {
        check_channel(channel)?;
        let mask = !(0xFFFFu64 << (16 * channel));
        for p in &mut self.data {
            *p &= mask;
        }
        Ok(())
    }

    /// Zeroes `channel` and shifts every later channel down by one, leaving
    /// the last channel empty. Channels past 3 are ignored.
    pub fn remove_channel(&mut self, channel: usize) {
        if channel >= CHANNELS {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let shift = 16 * channel as u32;
        let low = (1u64 << shift) - 1;
        for p in &mut self.data {
            let high = p.checked_shr(shift + 16).unwrap_or(0);
            *p = (*p & low) | (high << shift);
        }
    }

    /// Circular brush with linear falloff.
    ///
    /// Moves each covered texel toward full weight on `channel` by
    /// `strength * falloff`, then renormalises so the channels sum to 1.
    ///
    /// # Arguments
    ///
    /// * `center` - Brush center in texel coordinates
    /// * `radius` - Brush radius in texels
    /// * `channel` - Target channel (0..4)
    /// * `strength` - Blend amount at the center, 0..1
    ///
    /// # Errors
    ///
    /// [`TerrainError::SlotOutOfRange`] for a channel past 3.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn paint(&mut self, center: Vec2, radius: f32, channel: usize, strength: f32) -> TerrainResult<()> {
        check_channel(channel)?;
        if radius <= 0.0 {
            return Ok(());
        }
        let mut target = Vec4::ZERO;
        target[channel] = 1.0;

        let x0 = (center.x - radius).floor().max(0.0) as u32;
        let y0 = (center.y - radius).floor().max(0.0) as u32;
        let x1 = ((center.x + radius).ceil().max(0.0) as u32).min(self.width - 1);
        let y1 = ((center.y + radius).ceil().max(0.0) as u32).min(self.height - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vec2::new(x as f32, y as f32).distance(center);
                if d > radius {
                    continue;
                }
                let amount = (strength * (1.0 - d / radius)).clamp(0.0, 1.0);
                let i = y as usize * self.width as usize + x as usize;
                let current = decode_pixel(self.data[i]);
                let blended = current.lerp(target, amount);
                let sum = blended.element_sum();
                let normalised = if sum > 0.0 { blended / sum } else { target };
                self.data[i] = encode_pixel(normalised);
            }
        }
        Ok(())
    }

    /// Writes dimensions, size prefix and compressed texels.
    ///
    /// # Errors
    ///
    /// Propagates IO and codec failures.
    pub fn write<W: Write + Seek>(&self, writer: &mut W, ctx: &FormatContext) -> TerrainResult<()> {
        let e = ctx.endianness;
        writer.write_u32_in(e, self.width).section("layer mask")?;
        writer.write_u32_in(e, self.height).section("layer mask")?;
        section::write_section::<_, std::io::Error, _>(writer, e, ctx.compression, |w| {
            w.write_u64_slice_in(e, &self.data)
        })
        .section("layer mask")?;
        Ok(())
    }

    /// Reads data written by [`PackedLayerMask::write`].
    ///
    /// # Errors
    ///
    /// Truncation, codec or dimension errors.
    pub fn read<R: Read + Seek>(reader: &mut R, ctx: &FormatContext) -> TerrainResult<Self> {
        let e = ctx.endianness;
        let width = reader.read_u32_in(e).section("layer mask")?;
        let height = reader.read_u32_in(e).section("layer mask")?;
        let texels = check_dims("packed layer mask", width, height)?;
        let data = section::read_section::<_, _, std::io::Error, _>(reader, e, ctx.compression, |r| {
            r.read_u64_array_in(e, texels)
        })
        .section("layer mask")?;
        Self::from_data(width, height, data)
    }
}
