//! Endian-aware scalar, array, string and GUID helpers.
//!
//! The byte order of a container is only known at runtime, so every helper
//! takes an [`Endianness`] and dispatches to the matching `byteorder` call.

use crate::{Endianness, TextEncoding};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use uuid::Uuid;

/// Upper bound on element counts read from disk.
pub const MAX_ARRAY_LEN: usize = 1 << 28;

/// Elements read per step. Buffers grow only as data actually arrives, so a
/// forged length prefix over a short stream fails with `UnexpectedEof`
/// after at most one chunk of allocation.
const READ_CHUNK: usize = 1 << 14;

fn checked_len(count: usize) -> io::Result<usize> {
    if count > MAX_ARRAY_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("array length {count} exceeds limit {MAX_ARRAY_LEN}"),
        ));
    }
    Ok(count)
}

fn read_chunked<T, F>(count: usize, mut fill: F) -> io::Result<Vec<T>>
where
    T: Copy + Default,
    F: FnMut(&mut [T]) -> io::Result<()>,
{
    let count = checked_len(count)?;
    let mut values = Vec::with_capacity(count.min(READ_CHUNK));
    while values.len() < count {
        let start = values.len();
        let step = (count - start).min(READ_CHUNK);
        values.resize(start + step, T::default());
        fill(&mut values[start..])?;
    }
    Ok(values)
}

macro_rules! dispatch_read {
    ($self:ident, $e:expr, $method:ident) => {
        match $e {
            Endianness::Little => $self.$method::<LittleEndian>(),
            Endianness::Big => $self.$method::<BigEndian>(),
        }
    };
    ($self:ident, $e:expr, $method:ident, $buf:expr) => {
        match $e {
            Endianness::Little => $self.$method::<LittleEndian>($buf),
            Endianness::Big => $self.$method::<BigEndian>($buf),
        }
    };
}

/// Read helpers for any [`Read`] source.
pub trait ReadExt: Read {
    /// Reads a `u32`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends early.
    fn read_u32_in(&mut self, e: Endianness) -> io::Result<u32> {
        dispatch_read!(self, e, read_u32)
    }

    /// Reads an `i32`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends early.
    fn read_i32_in(&mut self, e: Endianness) -> io::Result<i32> {
        dispatch_read!(self, e, read_i32)
    }

    /// Reads a `u64`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends early.
    fn read_u64_in(&mut self, e: Endianness) -> io::Result<u64> {
        dispatch_read!(self, e, read_u64)
    }

    /// Reads an `f32`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends early.
    fn read_f32_in(&mut self, e: Endianness) -> io::Result<f32> {
        dispatch_read!(self, e, read_f32)
    }

    /// Reads `count` consecutive `u32`s.
    ///
    /// # Errors
    ///
    /// `InvalidData` if `count` exceeds [`MAX_ARRAY_LEN`], `UnexpectedEof`
    /// if the stream ends early.
    fn read_u32_array_in(&mut self, e: Endianness, count: usize) -> io::Result<Vec<u32>> {
        read_chunked(count, |buf| dispatch_read!(self, e, read_u32_into, buf))
    }

    /// Reads `count` consecutive `u16`s.
    ///
    /// # Errors
    ///
    /// Same as [`ReadExt::read_u32_array_in`].
    fn read_u16_array_in(&mut self, e: Endianness, count: usize) -> io::Result<Vec<u16>> {
        read_chunked(count, |buf| dispatch_read!(self, e, read_u16_into, buf))
    }

    /// Reads `count` consecutive `u64`s.
    ///
    /// # Errors
    ///
    /// Same as [`ReadExt::read_u32_array_in`].
    fn read_u64_array_in(&mut self, e: Endianness, count: usize) -> io::Result<Vec<u64>> {
        read_chunked(count, |buf| dispatch_read!(self, e, read_u64_into, buf))
    }

    /// Reads `count` consecutive `f32`s.
    ///
    /// # Errors
    ///
    /// Same as [`ReadExt::read_u32_array_in`].
    fn read_f32_array_in(&mut self, e: Endianness, count: usize) -> io::Result<Vec<f32>> {
        read_chunked(count, |buf| dispatch_read!(self, e, read_f32_into, buf))
    }

    /// Reads an `i32` byte length followed by encoded text.
    ///
    /// # Errors
    ///
    /// `InvalidData` for a negative length or malformed text.
    fn read_string_in(&mut self, e: Endianness, encoding: TextEncoding) -> io::Result<String> {
        let len = self.read_i32_in(e)?;
        let len = usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("negative string length {len}"))
        })?;
        let bytes = read_chunked(len, |buf| self.read_exact(buf))?;
        encoding.decode(bytes, e)
    }

    /// Reads a 16-byte GUID. GUID bytes are never swapped.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends early.
    fn read_uuid(&mut self) -> io::Result<Uuid> {
        let mut bytes = [0u8; 16];
        self.read_exact(&mut bytes)?;
        Ok(Uuid::from_bytes(bytes))
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

macro_rules! dispatch_write {
    ($self:ident, $e:expr, $method:ident, $value:expr) => {
        match $e {
            Endianness::Little => $self.$method::<LittleEndian>($value),
            Endianness::Big => $self.$method::<BigEndian>($value),
        }
    };
}

/// Write helpers for any [`Write`] sink.
pub trait WriteExt: Write {
    /// Writes a `u32`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_u32_in(&mut self, e: Endianness, value: u32) -> io::Result<()> {
        dispatch_write!(self, e, write_u32, value)
    }

    /// Writes an `i32`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_i32_in(&mut self, e: Endianness, value: i32) -> io::Result<()> {
        dispatch_write!(self, e, write_i32, value)
    }

    /// Writes a `u64`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_u64_in(&mut self, e: Endianness, value: u64) -> io::Result<()> {
        dispatch_write!(self, e, write_u64, value)
    }

    /// Writes an `f32`.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_f32_in(&mut self, e: Endianness, value: f32) -> io::Result<()> {
        dispatch_write!(self, e, write_f32, value)
    }

    /// Writes a `u32` slice. Native order is written with one cast.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_u32_slice_in(&mut self, e: Endianness, values: &[u32]) -> io::Result<()> {
        if e.is_native() {
            return self.write_all(bytemuck::cast_slice(values));
        }
        values.iter().try_for_each(|&v| self.write_u32_in(e, v))
    }

    /// Writes a `u16` slice. Native order is written with one cast.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_u16_slice_in(&mut self, e: Endianness, values: &[u16]) -> io::Result<()> {
        if e.is_native() {
            return self.write_all(bytemuck::cast_slice(values));
        }
        values
            .iter()
            .try_for_each(|&v| dispatch_write!(self, e, write_u16, v))
    }

    /// Writes a `u64` slice. Native order is written with one cast.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_u64_slice_in(&mut self, e: Endianness, values: &[u64]) -> io::Result<()> {
        if e.is_native() {
            return self.write_all(bytemuck::cast_slice(values));
        }
        values.iter().try_for_each(|&v| self.write_u64_in(e, v))
    }

    /// Writes an `f32` slice. Native order is written with one cast.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_f32_slice_in(&mut self, e: Endianness, values: &[f32]) -> io::Result<()> {
        if e.is_native() {
            return self.write_all(bytemuck::cast_slice(values));
        }
        values.iter().try_for_each(|&v| self.write_f32_in(e, v))
    }

    /// Writes an `i32` byte length followed by the encoded text.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the encoded text does not fit an `i32` length.
    fn write_string_in(&mut self, e: Endianness, encoding: TextEncoding, text: &str) -> io::Result<()> {
        let bytes = encoding.encode(text, e);
        let len = i32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
        self.write_i32_in(e, len)?;
        self.write_all(&bytes)
    }

    /// Writes a 16-byte GUID.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    fn write_uuid(&mut self, id: &Uuid) -> io::Result<()> {
        self.write_all(id.as_bytes())
    }
}

impl<W: Write + ?Sized> WriteExt for W {}
