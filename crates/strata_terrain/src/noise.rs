//! # Perlin Noise
//!
//! Deterministic 2D gradient noise for height field generation.
//!
//! ## Determinism Guarantee
//!
//! Given the same [`TerrainSeed`], this implementation produces exactly the
//! same values on any platform. Seed `0` uses Ken Perlin's reference
//! permutation; every other seed shuffles it with ChaCha8.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed for all procedural terrain generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TerrainSeed(u64);

impl TerrainSeed {
    /// Creates a new seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for a specific purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Deterministic RNG for random fills.
    #[must_use]
    pub fn rng(self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }
}

#[rustfmt::skip]
const REFERENCE_PERMUTATION: [u8; 256] = [
    151,160,137,91,90,15,131,13,201,95,96,53,194,233,7,225,140,36,103,30,69,142,8,99,37,240,21,10,23,
    190,6,148,247,120,234,75,0,26,197,62,94,252,219,203,117,35,11,32,57,177,33,88,237,149,56,87,174,
    20,125,136,171,168,68,175,74,165,71,134,139,48,27,166,77,146,158,231,83,111,229,122,60,211,133,
    230,220,105,92,41,55,46,245,40,244,102,143,54,65,25,63,161,1,216,80,73,209,76,132,187,208,89,18,
    169,200,196,135,130,116,188,159,86,164,100,109,198,173,186,3,64,52,217,226,250,124,123,5,202,38,
    147,118,126,255,82,85,212,207,206,59,227,47,16,58,17,182,189,28,42,223,183,170,213,119,248,152,
    2,44,154,163,70,221,153,101,155,167,43,172,9,129,22,39,253,19,98,108,110,79,113,224,232,178,185,
    112,104,218,246,97,228,251,34,242,193,238,210,144,12,191,179,162,241,81,51,145,235,249,14,239,
    107,49,192,214,31,181,199,106,157,184,84,204,176,115,121,50,45,127,4,150,254,138,236,205,93,222,
    114,67,29,24,72,243,141,128,195,78,66,215,61,156,180,
];

/// 2D Perlin noise generator.
///
/// Raw samples are roughly in `[-1, 1]`; callers remap with `* 0.5 + 0.5`.
///
/// # Example
///
/// ```rust,ignore
/// let noise = PerlinNoise::new(TerrainSeed::new(7));
/// let h = noise.sample(12.5, 3.25) * 0.5 + 0.5;
/// ```
#[derive(Clone, Debug)]
pub struct PerlinNoise {
    perm: [u8; 256],
}

impl PerlinNoise {
    /// Creates a generator for `seed`.
    #[must_use]
    pub fn new(seed: TerrainSeed) -> Self {
        let mut perm = REFERENCE_PERMUTATION;
        if seed.value() != 0 {
            // Fisher-Yates over the reference table
            let mut rng = seed.rng();
            for i in (1..perm.len()).rev() {
                let j = rng.gen_range(0..=i);
                perm.swap(i, j);
            }
        }
        Self { perm }
    }

    #[inline]
    fn p(&self, index: usize) -> usize {
        usize::from(self.perm[index & 255])
    }

    #[inline]
    fn fade(t: f32) -> f32 {
        t * t * (3.0 - 2.0 * t)
    }

    #[inline]
    fn lerp(a: f32, b: f32, t: f32) -> f32 {
        (b - a) * t + a
    }

    #[inline]
    fn grad(hash: usize, x: f32, y: f32) -> f32 {
        let h = hash & 7;
        let (u, v) = if h < 4 { (x, y) } else { (y, x) };
        let u = if h & 1 == 0 { u } else { -u };
        let v = if h & 2 == 0 { 2.0 * v } else { -2.0 * v };
        u + v
    }

    /// Samples noise at `(x, y)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        // Wrap into the 256 lattice; rem_euclid keeps negatives in range.
        let ix = (fx as i64).rem_euclid(256) as usize;
        let iy = (fy as i64).rem_euclid(256) as usize;
        let xf = x - fx;
        let yf = y - fy;
        let u = Self::fade(xf);
        let v = Self::fade(yf);

        let a = (self.p(ix) + iy) & 255;
        let b = (self.p(ix + 1) + iy) & 255;
        let aa = self.p(a);
        let ab = self.p(a + 1);
        let ba = self.p(b);
        let bb = self.p(b + 1);

        let x1 = Self::lerp(Self::grad(aa, xf, yf), Self::grad(ba, xf - 1.0, yf), u);
        let x2 = Self::lerp(
            Self::grad(ab, xf, yf - 1.0),
            Self::grad(bb, xf - 1.0, yf - 1.0),
            u,
        );
        Self::lerp(x1, x2, v)
    }

    /// Fractal sum of `octaves` samples, normalised by total amplitude.
    ///
    /// # Arguments
    ///
    /// * `octaves` - Number of layers (at least 1 is used)
    /// * `persistence` - Amplitude multiplier per octave
    #[must_use]
    pub fn octave(&self, x: f32, y: f32, octaves: u32, persistence: f32) -> f32 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        total / max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let a = PerlinNoise::new(TerrainSeed::new(12345));
        let b = PerlinNoise::new(TerrainSeed::new(12345));
        for i in 0..200 {
            let x = i as f32 * 0.37;
            let y = i as f32 * 0.11 - 20.0;
            assert_eq!(a.sample(x, y).to_bits(), b.sample(x, y).to_bits());
        }
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let noise = PerlinNoise::new(TerrainSeed::default());
        for (x, y) in [(0.0, 0.0), (3.0, 7.0), (-4.0, 12.0)] {
            assert_eq!(noise.sample(x, y), 0.0);
        }
    }

    #[test]
    fn test_seeds_differ() {
        let a = PerlinNoise::new(TerrainSeed::new(1));
        let b = PerlinNoise::new(TerrainSeed::new(2));
        let differs = (0..64).any(|i| {
            let x = i as f32 * 0.5 + 0.25;
            a.sample(x, 0.3) != b.sample(x, 0.3)
        });
        assert!(differs);
    }

    #[test]
    fn test_seeded_table_is_a_permutation() {
        let noise = PerlinNoise::new(TerrainSeed::new(99));
        let mut seen = [false; 256];
        for &v in &noise.perm {
            seen[usize::from(v)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_continuity() {
        let noise = PerlinNoise::new(TerrainSeed::new(5));
        let mut prev = noise.sample(0.0, 0.5);
        for i in 1..1000 {
            let cur = noise.sample(i as f32 * 0.001, 0.5);
            assert!((cur - prev).abs() < 0.05, "jump at {i}");
            prev = cur;
        }
    }

    #[test]
    fn test_octave_bounded() {
        let noise = PerlinNoise::new(TerrainSeed::new(3));
        for i in 0..500 {
            let v = noise.octave(i as f32 * 0.13, i as f32 * 0.07, 4, 0.5);
            assert!(v.abs() <= 3.0);
        }
    }

    #[test]
    fn test_derive_is_independent() {
        let seed = TerrainSeed::new(42);
        assert_ne!(seed.derive(1), seed.derive(2));
        assert_eq!(seed.derive(1), seed.derive(1));
    }
}
