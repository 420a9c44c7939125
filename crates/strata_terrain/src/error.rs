//! Terrain error types.

use std::io;
use thiserror::Error;

/// Level, rows and columns of a LOD mesh, reported on mismatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LodDims {
    /// LOD level.
    pub lod_level: u32,
    /// Vertices along the local X axis.
    pub rows: u32,
    /// Vertices along the local Z axis.
    pub columns: u32,
}

impl std::fmt::Display for LodDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LOD: {}, Rows: {}, Columns: {}", self.lod_level, self.rows, self.columns)
    }
}

/// Terrain errors.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// Underlying IO failure.
    #[error("IO error in {section}: {source}")]
    Io {
        /// Section being processed.
        section: &'static str,
        /// Cause.
        #[source]
        source: io::Error,
    },

    /// Stream ended inside a section.
    #[error("Truncated stream while reading {section}")]
    Truncated {
        /// Section being read.
        section: &'static str,
    },

    /// Container signature did not match.
    #[error("Magic mismatch: found {found:02x?}")]
    MagicMismatch {
        /// Bytes found at the start of the stream.
        found: [u8; 12],
    },

    /// Container version outside the supported range.
    #[error("Unsupported version {found} (supported {min}..={max})")]
    UnsupportedVersion {
        /// Version in the header.
        found: u64,
        /// Oldest readable version.
        min: u64,
        /// Newest readable version.
        max: u64,
    },

    /// An enum tag had no known meaning.
    #[error("Unknown {kind} identifier {value}")]
    UnknownEnum {
        /// Which tag.
        kind: &'static str,
        /// Raw value.
        value: i64,
    },

    /// Structurally invalid payload.
    #[error("Invalid data in {section}: {reason}")]
    InvalidData {
        /// Section being read.
        section: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Grid access outside its dimensions.
    #[error("Coordinate ({x}, {y}) out of bounds for {width}x{height} {what}")]
    OutOfBounds {
        /// Grid kind.
        what: &'static str,
        /// Requested x.
        x: u32,
        /// Requested y.
        y: u32,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },

    /// Dimensions that can not produce a valid grid or mesh.
    #[error("Invalid dimensions for {what}: {width}x{height}")]
    InvalidDimensions {
        /// Object kind.
        what: &'static str,
        /// Width or rows.
        width: u32,
        /// Height or columns.
        height: u32,
    },

    /// Edge operation between incompatible meshes.
    #[error("Terrain cell dimensions must be the same. ({a}), but other was ({b})")]
    LodMismatch {
        /// Receiver dimensions.
        a: LodDims,
        /// Neighbour dimensions.
        b: LodDims,
    },

    /// Seek table index past the last entry.
    #[error("Seek table index {index} out of range (entries: {len})")]
    SeekIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Entry count.
        len: usize,
    },

    /// A LOD block could not be located or parsed.
    #[error("LOD {index} not found: {reason}")]
    LodNotFound {
        /// Requested slot index.
        index: usize,
        /// Why the lookup failed.
        reason: String,
    },

    /// Operation needs a LOD that is still on disk.
    #[error("LOD slot {index} is not loaded")]
    LodNotLoaded {
        /// Slot index.
        index: usize,
    },

    /// Operation needs a height field that is still on disk.
    #[error("Height field of cell ({x}, {y}) is not loaded")]
    HeightFieldNotLoaded {
        /// Cell x.
        x: i32,
        /// Cell y.
        y: i32,
    },

    /// Layer group slot index past capacity.
    #[error("Layer slot {index} out of range (capacity {capacity})")]
    SlotOutOfRange {
        /// Requested slot.
        index: usize,
        /// Slot capacity.
        capacity: usize,
    },

    /// Layer group already holds the maximum number of layers.
    #[error("Layer group is full ({capacity} layers)")]
    LayerGroupFull {
        /// Slot capacity.
        capacity: usize,
    },

    /// Layer already present in the group.
    #[error("Layer '{name}' is already in the group")]
    DuplicateLayer {
        /// Layer name.
        name: String,
    },

    /// Group references a layer the container does not own.
    #[error("Layer '{name}' is not registered in the container")]
    UnknownLayer {
        /// Layer name.
        name: String,
    },

    /// Cell references a missing layer group.
    #[error("Layer group {index} does not exist (groups: {len})")]
    UnknownGroup {
        /// Referenced index.
        index: i64,
        /// Group count.
        len: usize,
    },

    /// Two cells share a coordinate.
    #[error("Cell ({x}, {y}) already exists")]
    DuplicateCell {
        /// Cell x.
        x: i32,
        /// Cell y.
        y: i32,
    },

    /// Operation cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker pool could not be started.
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// A scheduled job panicked. The worker survives and keeps draining
    /// the queue.
    #[error("Job panicked: {0}")]
    JobPanicked(String),
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;

impl From<io::Error> for TerrainError {
    fn from(source: io::Error) -> Self {
        classify(source, "stream")
    }
}

/// Payload of the IO error a cancelled reader returns.
///
/// `ErrorKind::Interrupted` is retried by `read_exact` and most decoders,
/// so cancellation travels as a typed error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read cancelled")]
pub struct ReadCancelled;

impl ReadCancelled {
    /// The IO error carrying this marker.
    #[must_use]
    pub fn io_error() -> io::Error {
        io::Error::other(Self)
    }

    /// True if `error` carries this marker.
    #[must_use]
    pub fn is(error: &io::Error) -> bool {
        error.get_ref().is_some_and(|inner| inner.is::<Self>())
    }
}

fn classify(source: io::Error, section: &'static str) -> TerrainError {
    if ReadCancelled::is(&source) {
        return TerrainError::Cancelled;
    }
    match source.kind() {
        io::ErrorKind::UnexpectedEof => TerrainError::Truncated { section },
        io::ErrorKind::Interrupted => TerrainError::Cancelled,
        _ => TerrainError::Io { section, source },
    }
}

/// Attaches a section name to IO failures.
pub trait IoContext<T> {
    /// Maps EOF to [`TerrainError::Truncated`] and other failures to
    /// [`TerrainError::Io`], both tagged with `section`.
    ///
    /// # Errors
    ///
    /// Returns the mapped error.
    fn section(self, section: &'static str) -> TerrainResult<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn section(self, section: &'static str) -> TerrainResult<T> {
        self.map_err(|e| classify(e, section))
    }
}

impl<T> IoContext<T> for TerrainResult<T> {
    fn section(self, section: &'static str) -> TerrainResult<T> {
        self.map_err(|e| match e {
            TerrainError::Truncated { .. } => TerrainError::Truncated { section },
            TerrainError::Io { source, .. } => TerrainError::Io { section, source },
            other => other,
        })
    }
}
