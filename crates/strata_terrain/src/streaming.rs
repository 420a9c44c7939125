//! # LOD Streaming
//!
//! Loads single LOD meshes in the background and swaps them into a live
//! slot without ever exposing a partially built mesh.
//!
//! ```text
//! request(locator, index, target)
//!    │ priority = for_lod(level, count)
//!    ▼
//! JobScheduler ──► SharedSource::with_reader ──► CancellableReader
//!                        (one reader at a time)        │
//!                                                       ▼
//!                                      LodLocator::load ──► ActiveLod::swap
//! ```
//!
//! A load that fails or is cancelled leaves the target untouched. Each
//! request takes a fresh generation from its target; only the newest
//! request for a target may install, so a slow older load finishing late
//! yields [`TerrainError::Cancelled`] instead of overwriting a newer mesh.

use crate::cell::LodLocator;
use crate::error::{IoContext, ReadCancelled, TerrainError, TerrainResult};
use crate::lod::LodMesh;
use crate::scheduler::{CancelToken, JobHandle, JobPriority, JobScheduler};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Something that can produce a fresh seekable reader over a container.
pub trait LodSource: Send + Sync + 'static {
    /// Reader type.
    type Reader: Read + Seek;

    /// Opens a reader positioned at the start of the container.
    ///
    /// # Errors
    ///
    /// Whatever opening the underlying storage returns.
    fn open(&self) -> io::Result<Self::Reader>;
}

/// Container file on disk.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LodSource for FileSource {
    type Reader = BufReader<File>;

    fn open(&self) -> io::Result<Self::Reader> {
        File::open(&self.path).map(BufReader::new)
    }
}

/// Container held in memory.
#[derive(Clone, Debug)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    /// Source over `bytes`.
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Container length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl LodSource for MemorySource {
    type Reader = Cursor<Arc<[u8]>>;

    fn open(&self) -> io::Result<Self::Reader> {
        Ok(Cursor::new(Arc::clone(&self.bytes)))
    }
}

/// Serializes access to a source.
#[derive(Debug)]
pub struct SharedSource<S> {
    source: S,
    gate: Mutex<()>,
}

impl<S: LodSource> SharedSource<S> {
    /// Wraps `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            gate: Mutex::new(()),
        }
    }

    /// Wrapped source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Opens a reader and runs `f` on it while holding the source lock.
    ///
    /// The reader and the lock are released when this returns, on every path.
    ///
    /// # Errors
    ///
    /// Failure to open the source, or whatever `f` returns.
    pub fn with_reader<T, F>(&self, f: F) -> TerrainResult<T>
    where
        F: FnOnce(&mut S::Reader) -> TerrainResult<T>,
    {
        let _gate = self.gate.lock();
        let mut reader = self.source.open().section("source")?;
        f(&mut reader)
    }
}

/// Reader that fails every call once its token is cancelled.
#[derive(Debug)]
pub struct CancellableReader<R> {
    inner: R,
    token: CancelToken,
}

impl<R> CancellableReader<R> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: R, token: CancelToken) -> Self {
        Self { inner, token }
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn check(&self) -> io::Result<()> {
        if self.token.is_cancelled() {
            return Err(ReadCancelled::io_error());
        }
        Ok(())
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for CancellableReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check()?;
        self.inner.seek(pos)
    }
}

/// The mesh a renderer currently draws for one cell.
#[derive(Debug, Default)]
pub struct ActiveLod {
    slot: RwLock<Option<(u32, Arc<LodMesh>)>>,
    generation: AtomicU64,
}

impl ActiveLod {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot holding `mesh`.
    #[must_use]
    pub fn with_mesh(mesh: Arc<LodMesh>) -> Self {
        Self {
            slot: RwLock::new(Some((mesh.lod_level(), mesh))),
            generation: AtomicU64::new(0),
        }
    }

    /// Current level and mesh.
    #[must_use]
    pub fn current(&self) -> Option<(u32, Arc<LodMesh>)> {
        self.slot.read().clone()
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> Option<u32> {
        self.slot.read().as_ref().map(|(level, _)| *level)
    }

    /// Installs `mesh` and returns the previous one.
    ///
    /// Readers see either the old or the new mesh. The previous mesh is
    /// released by the caller, after the lock.
    #[must_use = "the previous mesh is dropped when the return value is"]
    pub fn swap(&self, level: u32, mesh: Arc<LodMesh>) -> Option<(u32, Arc<LodMesh>)> {
        self.slot.write().replace((level, mesh))
    }

    /// Starts a new request generation, superseding every earlier one.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// True while no newer generation has been started.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Installs `mesh` only if `generation` is still the newest.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Cancelled`] if a newer generation exists; the slot
    /// is left as it was.
    pub fn swap_if_current(
        &self,
        generation: u64,
        level: u32,
        mesh: Arc<LodMesh>,
    ) -> TerrainResult<Option<(u32, Arc<LodMesh>)>> {
        let mut slot = self.slot.write();
        if !self.is_current(generation) {
            return Err(TerrainError::Cancelled);
        }
        Ok(slot.replace((level, mesh)))
    }
}

/// Background LOD loader over one shared source.
#[derive(Debug)]
pub struct LodStreamer<S> {
    source: Arc<SharedSource<S>>,
    scheduler: JobScheduler,
}

impl<S: LodSource> LodStreamer<S> {
    /// Starts `workers` loader threads over `source`.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Pool`] if the threads can not be started.
    pub fn new(source: S, workers: usize) -> TerrainResult<Self> {
        Ok(Self {
            source: Arc::new(SharedSource::new(source)),
            scheduler: JobScheduler::new(workers)?,
        })
    }

    /// Shared source.
    #[must_use]
    pub fn source(&self) -> &SharedSource<S> {
        &self.source
    }

    /// Underlying scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Loads LOD `index` of the located cell and swaps it into `target`.
    ///
    /// The job runs at [`JobPriority::for_lod`] of the entry's level and
    /// yields the installed level. On failure or cancellation `target`
    /// keeps its previous mesh and the handle yields the error. A request
    /// superseded by a later one on the same target yields
    /// [`TerrainError::Cancelled`] whatever order the jobs finish in.
    pub fn request(
        &self,
        locator: LodLocator,
        index: usize,
        target: Arc<ActiveLod>,
    ) -> JobHandle<TerrainResult<u32>> {
        #[allow(clippy::cast_possible_truncation)]
        let count = locator.lod_count() as u32;
        let priority = locator
            .lod_level(index)
            .map_or(JobPriority::Low, |level| JobPriority::for_lod(level, count));
        let source = Arc::clone(&self.source);
        let generation = target.next_generation();
        trace!(coord = ?locator.coord(), index, ?priority, generation, "queued LOD load");

        self.scheduler.submit(priority, move |token| {
            let coord = locator.coord();
            if !target.is_current(generation) {
                debug!(?coord, index, generation, "LOD request superseded before loading");
                return Err(TerrainError::Cancelled);
            }
            let loaded = source.with_reader(|reader| {
                let mut reader = CancellableReader::new(reader, token.clone());
                locator.load(index, &mut reader)
            });
            let mesh = match loaded {
                Ok(mesh) if !token.is_cancelled() => mesh,
                Ok(_) | Err(TerrainError::Cancelled) => {
                    warn!(?coord, index, "LOD load cancelled, keeping current mesh");
                    return Err(TerrainError::Cancelled);
                }
                Err(err) => {
                    warn!(?coord, index, error = %err, "LOD load failed, keeping current mesh");
                    return Err(err);
                }
            };

            let level = mesh.lod_level();
            let previous = target.swap_if_current(generation, level, Arc::new(mesh)).map_err(|err| {
                debug!(?coord, index, generation, "LOD request superseded, discarding mesh");
                err
            })?;
            debug!(?coord, level, previous = ?previous.as_ref().map(|(l, _)| *l), "swapped LOD");
            drop(previous);
            Ok(level)
        })
    }

    /// Loads synchronously on the calling thread, still serialized with
    /// background loads on the same source.
    ///
    /// # Errors
    ///
    /// As [`LodLocator::load`].
    pub fn load_now(&self, locator: &LodLocator, index: usize) -> TerrainResult<LodMesh> {
        self.source.with_reader(|reader| locator.load(index, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_reader_fails_every_call() {
        let token = CancelToken::new();
        let mut reader = CancellableReader::new(Cursor::new(vec![1u8, 2, 3, 4]), token.clone());
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        token.cancel();
        let err = reader.read_exact(&mut buf).unwrap_err();
        assert!(ReadCancelled::is(&err));
        assert!(ReadCancelled::is(&reader.seek(SeekFrom::Start(0)).unwrap_err()));
        assert!(matches!(TerrainError::from(err), TerrainError::Cancelled));
    }

    #[test]
    fn test_shared_source_reopens_from_start() {
        let shared = SharedSource::new(MemorySource::new(vec![9u8, 8, 7]));
        for _ in 0..2 {
            let first = shared
                .with_reader(|r| {
                    let mut b = [0u8; 1];
                    r.read_exact(&mut b)?;
                    Ok(b[0])
                })
                .unwrap();
            assert_eq!(first, 9);
        }
    }

    #[test]
    fn test_shared_source_releases_on_error() {
        let shared = SharedSource::new(MemorySource::new(Vec::new()));
        let err = shared.with_reader(|_| -> TerrainResult<()> { Err(TerrainError::Cancelled) });
        assert!(err.is_err());
        // The gate must be free again.
        assert!(shared.with_reader(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_missing_file_source() {
        let source = SharedSource::new(FileSource::new("/nonexistent/strata.terrain"));
        assert!(matches!(
            source.with_reader(|_| Ok(())),
            Err(TerrainError::Io { section: "source", .. })
        ));
    }

    #[test]
    fn test_active_lod_swap_returns_previous() {
        let coarse = Arc::new(LodMesh::new(2, 8, 8, 3, 3).unwrap());
        let fine = Arc::new(LodMesh::new(0, 8, 8, 9, 9).unwrap());
        let active = ActiveLod::with_mesh(Arc::clone(&coarse));
        assert_eq!(active.level(), Some(2));

        let previous = active.swap(0, Arc::clone(&fine)).unwrap();
        assert!(Arc::ptr_eq(&previous.1, &coarse));
        assert_eq!(previous.0, 2);
        let (level, current) = active.current().unwrap();
        assert_eq!(level, 0);
        assert!(Arc::ptr_eq(&current, &fine));
    }

    #[test]
    fn test_stale_generation_cannot_install() {
        let coarse = Arc::new(LodMesh::new(2, 8, 8, 3, 3).unwrap());
        let fine = Arc::new(LodMesh::new(0, 8, 8, 9, 9).unwrap());
        let active = ActiveLod::new();

        let older = active.next_generation();
        let newer = active.next_generation();
        assert!(!active.is_current(older));
        assert!(active.is_current(newer));

        assert!(active.swap_if_current(newer, 0, Arc::clone(&fine)).unwrap().is_none());
        assert!(matches!(
            active.swap_if_current(older, 2, coarse),
            Err(TerrainError::Cancelled)
        ));
        let (level, current) = active.current().unwrap();
        assert_eq!(level, 0);
        assert!(Arc::ptr_eq(&current, &fine));
    }
}
