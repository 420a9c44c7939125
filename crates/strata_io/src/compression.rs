//! # Section Compression
//!
//! Every compressed section goes through one of these wrappers. The mode is
//! chosen once per container and stored in its header, so readers never
//! sniff the payload.
//!
//! | Mode    | Id | Codec                         |
//! |---------|----|-------------------------------|
//! | None    | 0  | bytes stored as-is            |
//! | Deflate | 1  | raw deflate (`flate2`)        |
//! | Lz4     | 2  | LZ4 frame format (`lz4_flex`) |

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Compression applied to height fields, masks and LOD blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Stored uncompressed.
    None,
    /// Raw deflate stream.
    Deflate,
    /// LZ4 frame.
    #[default]
    Lz4,
}

impl Compression {
    /// Decodes the on-disk identifier.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Deflate),
            2 => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Encodes the on-disk identifier.
    #[must_use]
    pub const fn to_i32(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Deflate => 1,
            Self::Lz4 => 2,
        }
    }

    /// Wraps `inner` in a compressing writer.
    ///
    /// The returned writer must be [`CompressWriter::finish`]ed; dropping it
    /// may lose buffered output.
    pub fn compressor<W: Write>(self, inner: W) -> CompressWriter<W> {
        match self {
            Self::None => CompressWriter::Stored(inner),
            Self::Deflate => {
                CompressWriter::Deflate(DeflateEncoder::new(inner, flate2::Compression::default()))
            }
            Self::Lz4 => CompressWriter::Lz4(FrameEncoder::new(inner)),
        }
    }

    /// Wraps `inner` in a decompressing reader.
    pub fn decompressor<R: Read>(self, inner: R) -> DecompressReader<R> {
        match self {
            Self::None => DecompressReader::Stored(inner),
            Self::Deflate => DecompressReader::Deflate(DeflateDecoder::new(inner)),
            Self::Lz4 => DecompressReader::Lz4(FrameDecoder::new(inner)),
        }
    }

    /// Compresses a whole buffer.
    ///
    /// # Errors
    ///
    /// Propagates codec failures.
    pub fn compress_to_vec(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut writer = self.compressor(Vec::with_capacity(data.len() / 2));
        writer.write_all(data)?;
        writer.finish()
    }

    /// Decompresses a whole buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a valid stream for this mode.
    pub fn decompress_to_vec(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 2);
        self.decompressor(data).read_to_end(&mut out)?;
        Ok(out)
    }
}

/// Writer half of a [`Compression`] mode.
pub enum CompressWriter<W: Write> {
    /// Pass-through.
    Stored(W),
    /// Deflate encoder.
    Deflate(DeflateEncoder<W>),
    /// LZ4 frame encoder.
    Lz4(FrameEncoder<W>),
}

impl<W: Write> CompressWriter<W> {
    /// Flushes the codec trailer and returns the inner writer.
    ///
    /// # Errors
    ///
    /// Propagates write failures from the codec or the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Stored(mut inner) => {
                inner.flush()?;
                Ok(inner)
            }
            Self::Deflate(encoder) => encoder.finish(),
            Self::Lz4(encoder) => encoder.finish().map_err(io::Error::other),
        }
    }
}

impl<W: Write> Write for CompressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stored(inner) => inner.write(buf),
            Self::Deflate(encoder) => encoder.write(buf),
            Self::Lz4(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stored(inner) => inner.flush(),
            Self::Deflate(encoder) => encoder.flush(),
            Self::Lz4(encoder) => encoder.flush(),
        }
    }
}

/// Reader half of a [`Compression`] mode.
pub enum DecompressReader<R: Read> {
    /// Pass-through.
    Stored(R),
    /// Deflate decoder.
    Deflate(DeflateDecoder<R>),
    /// LZ4 frame decoder.
    Lz4(FrameDecoder<R>),
}

impl<R: Read> Read for DecompressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stored(inner) => inner.read(buf),
            Self::Deflate(decoder) => decoder.read(buf),
            Self::Lz4(decoder) => decoder.read(buf),
        }
    }
}
