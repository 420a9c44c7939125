//! # Sections
//!
//! Compressed payloads have sizes that are only known after writing, so the
//! writer reserves room for the size (or a whole index), streams the payload
//! through a [`CompressWriter`](crate::CompressWriter) and seeks back to patch
//! the reservation.
//!
//! ```text
//! ┌────────────────┬──────────────────────────────┐
//! │ payloadSize:u32│ compressed payload (size B)  │   write_section / read_section_header
//! └────────────────┴──────────────────────────────┘
//! ┌──────────────────────────────┐
//! │ compressed payload           │                    write_block (size kept elsewhere)
//! └──────────────────────────────┘
//! ```

use crate::compression::{CompressWriter, DecompressReader};
use crate::{Compression, Endianness, ReadExt, WriteExt};
use std::io::{self, Read, Seek, SeekFrom, Take, Write};

/// Location of a payload inside a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SectionSpan {
    /// Absolute position of the first payload byte.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u32,
}

impl SectionSpan {
    /// Creates a span.
    #[must_use]
    #[inline]
    pub const fn new(offset: u64, size: u32) -> Self {
        Self { offset, size }
    }

    /// Absolute position one past the payload.
    #[must_use]
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset + self.size as u64
    }
}

fn too_large(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{what} exceeds 4 GiB"))
}

/// A zero-filled region written now and overwritten later.
#[derive(Debug)]
#[must_use = "a reservation must be patched"]
pub struct Reservation {
    offset: u64,
    len: u64,
}

impl Reservation {
    /// Writes `len` zero bytes at the current position.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn reserve<W: Write + Seek>(writer: &mut W, len: usize) -> io::Result<Self> {
        let offset = writer.stream_position()?;
        io::copy(&mut io::repeat(0).take(len as u64), writer)?;
        Ok(Self { offset, len: len as u64 })
    }

    /// Absolute position of the reserved bytes.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Seeks back, lets `fill` overwrite the region and returns to where the
    /// writer was.
    ///
    /// # Errors
    ///
    /// `InvalidData` if `fill` wrote a different number of bytes than were
    /// reserved, otherwise whatever `fill` or the sink returns.
    pub fn patch<W, E, F>(self, writer: &mut W, fill: F) -> Result<(), E>
    where
        W: Write + Seek,
        E: From<io::Error>,
        F: FnOnce(&mut W) -> Result<(), E>,
    {
        let resume = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.offset))?;
        fill(writer)?;
        let written = writer.stream_position()? - self.offset;
        if written != self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("patched {written} bytes into a {} byte reservation", self.len),
            )
            .into());
        }
        writer.seek(SeekFrom::Start(resume))?;
        Ok(())
    }
}

/// Compresses `body` at the current position without a size prefix.
///
/// # Errors
///
/// Propagates codec, sink and `body` errors; `InvalidData` if the block
/// exceeds `u32::MAX` bytes.
pub fn write_block<W, E, F>(
    writer: &mut W,
    compression: Compression,
    body: F,
) -> Result<SectionSpan, E>
where
    W: Write + Seek,
    E: From<io::Error>,
    F: FnOnce(&mut CompressWriter<&mut W>) -> Result<(), E>,
{
    let start = writer.stream_position()?;
    let mut encoder = compression.compressor(&mut *writer);
    body(&mut encoder)?;
    encoder.finish()?;
    let end = writer.stream_position()?;
    let size = u32::try_from(end - start).map_err(|_| too_large("block"))?;
    Ok(SectionSpan::new(start, size))
}

/// Writes `payloadSize:u32` followed by the compressed `body`, patching the
/// size once it is known.
///
/// # Errors
///
/// Same as [`write_block`].
pub fn write_section<W, E, F>(
    writer: &mut W,
    endianness: Endianness,
    compression: Compression,
    body: F,
) -> Result<SectionSpan, E>
where
    W: Write + Seek,
    E: From<io::Error>,
    F: FnOnce(&mut CompressWriter<&mut W>) -> Result<(), E>,
{
    let size_slot = Reservation::reserve(writer, 4)?;
    let span = write_block(writer, compression, body)?;
    size_slot.patch(writer, |w| w.write_u32_in(endianness, span.size).map_err(E::from))?;
    Ok(span)
}

/// Reads a `payloadSize:u32` prefix and returns the span that follows it,
/// leaving the reader at the payload start.
///
/// # Errors
///
/// `UnexpectedEof` if the prefix is missing.
pub fn read_section_header<R: Read + Seek>(
    reader: &mut R,
    endianness: Endianness,
) -> io::Result<SectionSpan> {
    let size = reader.read_u32_in(endianness)?;
    let offset = reader.stream_position()?;
    Ok(SectionSpan::new(offset, size))
}

/// Reads a section prefix and seeks past its payload.
///
/// # Errors
///
/// Same as [`read_section_header`].
pub fn skip_section<R: Read + Seek>(reader: &mut R, endianness: Endianness) -> io::Result<SectionSpan> {
    let span = read_section_header(reader, endianness)?;
    reader.seek(SeekFrom::Start(span.end()))?;
    Ok(span)
}

/// Decompresses the payload at `span` with `parse` and leaves the reader at
/// `span.end()`.
///
/// The decoder only ever sees `span.size` bytes, so a corrupt payload can
/// not read into the next section.
///
/// # Errors
///
/// Propagates seek failures and anything `parse` returns.
pub fn read_block<R, T, E, F>(
    reader: &mut R,
    span: SectionSpan,
    compression: Compression,
    parse: F,
) -> Result<T, E>
where
    R: Read + Seek,
    E: From<io::Error>,
    F: FnOnce(&mut DecompressReader<Take<&mut R>>) -> Result<T, E>,
{
    reader.seek(SeekFrom::Start(span.offset))?;
    let value = {
        let mut decoder = compression.decompressor((&mut *reader).take(u64::from(span.size)));
        parse(&mut decoder)?
    };
    reader.seek(SeekFrom::Start(span.end()))?;
    Ok(value)
}

/// [`read_section_header`] followed by [`read_block`].
///
/// # Errors
///
/// Same as [`read_block`].
pub fn read_section<R, T, E, F>(
    reader: &mut R,
    endianness: Endianness,
    compression: Compression,
    parse: F,
) -> Result<T, E>
where
    R: Read + Seek,
    E: From<io::Error>,
    F: FnOnce(&mut DecompressReader<Take<&mut R>>) -> Result<T, E>,
{
    let span = read_section_header(reader, endianness)?;
    read_block(reader, span, compression, parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_section_size_is_patched() {
        for mode in [Compression::None, Compression::Deflate, Compression::Lz4] {
            let mut out = Cursor::new(Vec::new());
            out.write_u32_in(Endianness::Big, 0xAABB_CCDD).unwrap();
            let span = write_section::<_, io::Error, _>(&mut out, Endianness::Big, mode, |w| {
                w.write_f32_slice_in(Endianness::Big, &[1.0; 256])
            })
            .unwrap();
            out.write_u32_in(Endianness::Big, 7).unwrap();

            assert_eq!(span.offset, 8);
            let bytes = out.into_inner();
            let prefix = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            assert_eq!(prefix, span.size);

            let mut input = Cursor::new(bytes);
            input.set_position(4);
            let floats = read_section::<_, _, io::Error, _>(&mut input, Endianness::Big, mode, |r| {
                r.read_f32_array_in(Endianness::Big, 256)
            })
            .unwrap();
            assert!(floats.iter().all(|&f| f == 1.0));
            assert_eq!(input.read_u32_in(Endianness::Big).unwrap(), 7);
        }
    }

    #[test]
    fn test_skip_lands_after_payload() {
        let mut out = Cursor::new(Vec::new());
        write_section::<_, io::Error, _>(&mut out, Endianness::Little, Compression::Lz4, |w| {
            w.write_all(&[3u8; 100])
        })
        .unwrap();
        out.write_u32_in(Endianness::Little, 99).unwrap();

        let mut input = Cursor::new(out.into_inner());
        let span = skip_section(&mut input, Endianness::Little).unwrap();
        assert_eq!(input.position(), span.end());
        assert_eq!(input.read_u32_in(Endianness::Little).unwrap(), 99);
    }

    #[test]
    fn test_decoder_cannot_overrun_span() {
        let mut out = Cursor::new(Vec::new());
        write_section::<_, io::Error, _>(&mut out, Endianness::Little, Compression::None, |w| {
            w.write_all(&[1, 2])
        })
        .unwrap();
        out.write_all(&[9, 9, 9, 9]).unwrap();

        let mut input = Cursor::new(out.into_inner());
        let err = read_section::<_, _, io::Error, _>(
            &mut input,
            Endianness::Little,
            Compression::None,
            |r| r.read_u32_in(Endianness::Little),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_reservation_rejects_wrong_length() {
        let mut out = Cursor::new(Vec::new());
        let slot = Reservation::reserve(&mut out, 8).unwrap();
        out.write_all(&[5; 3]).unwrap();
        let result: io::Result<()> = slot.patch(&mut out, |w| w.write_u32_in(Endianness::Little, 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_reservation_restores_position() {
        let mut out = Cursor::new(Vec::new());
        let slot = Reservation::reserve(&mut out, 4).unwrap();
        out.write_all(&[5; 3]).unwrap();
        slot.patch::<_, io::Error, _>(&mut out, |w| w.write_u32_in(Endianness::Little, 0x0403_0201))
            .unwrap();
        assert_eq!(out.position(), 7);
        assert_eq!(out.into_inner(), [1, 2, 3, 4, 5, 5, 5]);
    }
}
