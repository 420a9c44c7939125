//! # STRATA IO
//!
//! Binary building blocks shared by every STRATA container format:
//! - Header tags: [`Endianness`], [`TextEncoding`], [`Compression`]
//! - Compressing/decompressing stream wrappers selected at runtime
//! - Endian-aware read/write extension traits ([`ReadExt`], [`WriteExt`])
//! - Size-prefixed sections that are written first and patched afterwards
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_io::{Compression, Endianness, section};
//!
//! let mut out = std::io::Cursor::new(Vec::new());
//! section::write_section::<_, std::io::Error, _>(
//!     &mut out, Endianness::Little, Compression::Lz4,
//!     |w| w.write_f32_slice_in(Endianness::Little, &[1.0, 2.0]),
//! )?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod binary;
pub mod compression;
pub mod endian;
pub mod section;
pub mod text;

pub use binary::{ReadExt, WriteExt, MAX_ARRAY_LEN};
pub use compression::{Compression, CompressWriter, DecompressReader};
pub use endian::Endianness;
pub use section::{Reservation, SectionSpan};
pub use text::TextEncoding;
