//! # Job Scheduler
//!
//! A small fixed pool of worker threads draining a priority queue.
//!
//! ## Contract
//!
//! - Higher [`JobPriority`] runs first; equal priorities run in submission
//!   order. Priority is advisory: a running job is never preempted.
//! - A job cancelled before a worker picks it up never runs.
//! - A running job sees cancellation through its [`CancelToken`].
//! - Results arrive over a bounded channel; [`JobHandle::wait_timeout`]
//!   never blocks longer than asked.
//! - A panicking job is reported as [`TerrainError::JobPanicked`] and its
//!   worker carries on with the next job.

use crate::error::{TerrainError, TerrainResult};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Scheduling priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum JobPriority {
    /// Background work.
    Low = 0,
    /// Default.
    #[default]
    Normal = 1,
    /// Visible soon.
    High = 2,
    /// Visible now.
    Highest = 3,
}

impl JobPriority {
    /// Priority for loading `level` out of `level_count` levels.
    ///
    /// Finer levels (lower numbers) get higher priority:
    /// `round(lerp(Low, Highest, clamp01(1 - level / level_count)))`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn for_lod(level: u32, level_count: u32) -> Self {
        if level_count == 0 {
            return Self::Highest;
        }
        let s = (1.0 - level as f32 / level_count as f32).clamp(0.0, 1.0);
        match (s * 3.0).round() as u8 {
            0 => Self::Low,
            1 => Self::Normal,
            2 => Self::High,
            _ => Self::Highest,
        }
    }
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Sets the flag when the job closure is consumed or dropped.
struct DoneGuard(Arc<AtomicBool>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

type Task = Box<dyn FnOnce() + Send>;

struct QueuedJob {
    priority: JobPriority,
    sequence: u64,
    token: CancelToken,
    task: Task,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then lower sequence first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_sequence: u64,
    shutdown: bool,
}

#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
}

/// Completion handle for a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    result: Receiver<TerrainResult<T>>,
    token: CancelToken,
    done: Arc<AtomicBool>,
}

impl<T> JobHandle<T> {
    /// Requests cancellation. A job that has not started never runs.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The job's token.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// True once the job has run or been discarded.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::Acquire) || !self.result.is_empty()
    }

    /// Blocks until the job completes.
    ///
    /// # Errors
    ///
    /// [`TerrainError::Cancelled`] if the job was discarded without running,
    /// [`TerrainError::JobPanicked`] if it panicked.
    pub fn wait(self) -> TerrainResult<T> {
        self.result.recv().map_err(|_| TerrainError::Cancelled)?
    }

    /// Blocks for at most `timeout`. `None` means still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TerrainResult<T>> {
        match self.result.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TerrainError::Cancelled)),
        }
    }

    /// Non-blocking poll. `None` means still pending.
    pub fn try_wait(&self) -> Option<TerrainResult<T>> {
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TerrainError::Cancelled)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Fixed worker pool with a priority queue.
pub struct JobScheduler {
    queue: Arc<Queue>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl JobScheduler {
    /// Spawns `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// [`TerrainError::Pool`] if a thread can not be spawned.
    pub fn new(workers: usize) -> TerrainResult<Self> {
        let queue = Arc::new(Queue::default());
        let mut scheduler = Self {
            queue,
            workers: Vec::with_capacity(workers.max(1)),
        };
        for i in 0..workers.max(1) {
            let queue = Arc::clone(&scheduler.queue);
            let handle = thread::Builder::new()
                .name(format!("strata-stream-{i}"))
                .spawn(move || Self::worker_loop(&queue))
                .map_err(|e| TerrainError::Pool(e.to_string()))?;
            scheduler.workers.push(handle);
        }
        debug!(workers = scheduler.workers.len(), "started job scheduler");
        Ok(scheduler)
    }

    fn worker_loop(queue: &Queue) {
        loop {
            let job = {
                let mut state = queue.state.lock();
                while state.heap.is_empty() && !state.shutdown {
                    queue.not_empty.wait(&mut state);
                }
                if state.shutdown {
                    return;
                }
                state.heap.pop()
            };
            let Some(job) = job else { continue };
            if job.token.is_cancelled() {
                trace!(sequence = job.sequence, "skipped cancelled job");
                continue;
            }
            (job.task)();
        }
    }

    /// Queues `job`. The closure receives the job's cancellation token.
    ///
    /// After [`JobScheduler::shutdown`] the job is discarded and its handle
    /// reports [`TerrainError::Cancelled`].
    pub fn submit<T, F>(&self, priority: JobPriority, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let token = CancelToken::new();
        let done = Arc::new(AtomicBool::new(false));

        let guard = DoneGuard(Arc::clone(&done));
        let job_token = token.clone();
        let task: Task = Box::new(move || {
            let _guard = guard;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&job_token))).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(%message, "job panicked");
                TerrainError::JobPanicked(message)
            });
            // The handle may already be gone; nobody is waiting then.
            let _ = sender.send(outcome);
        });

        let mut state = self.queue.state.lock();
        if state.shutdown {
            drop(state);
            drop(task);
        } else {
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.heap.push(QueuedJob {
                priority,
                sequence,
                token: token.clone(),
                task,
            });
            drop(state);
            self.queue.not_empty.notify_one();
        }

        JobHandle {
            result: receiver,
            token,
            done,
        }
    }

    /// Jobs waiting for a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.state.lock().heap.len()
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Discards queued jobs and stops workers after their current job.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.queue.state.lock();
            state.shutdown = true;
            std::mem::take(&mut state.heap)
        };
        self.queue.not_empty.notify_all();
        if !discarded.is_empty() {
            debug!(discarded = discarded.len(), "job scheduler shut down");
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Occupies the only worker until the returned sender is dropped.
    fn occupy(scheduler: &JobScheduler) -> (crossbeam_channel::Sender<()>, JobHandle<()>) {
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        let handle = scheduler.submit(JobPriority::Highest, move |_| {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv().unwrap();
        (release_tx, handle)
    }

    #[test]
    fn test_for_lod_priorities() {
        assert_eq!(JobPriority::for_lod(0, 4), JobPriority::Highest);
        assert_eq!(JobPriority::for_lod(1, 4), JobPriority::High);
        assert_eq!(JobPriority::for_lod(3, 4), JobPriority::Normal);
        assert_eq!(JobPriority::for_lod(4, 4), JobPriority::Low);
        assert_eq!(JobPriority::for_lod(9, 4), JobPriority::Low);
        assert_eq!(JobPriority::for_lod(0, 0), JobPriority::Highest);
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let scheduler = JobScheduler::new(1).unwrap();
        let (release, blocker) = occupy(&scheduler);

        let order = Arc::new(Mutex::new(Vec::new()));
        let jobs = [
            (JobPriority::Low, "low"),
            (JobPriority::Normal, "normal-1"),
            (JobPriority::Highest, "highest"),
            (JobPriority::Normal, "normal-2"),
            (JobPriority::High, "high"),
        ];
        let handles: Vec<_> = jobs
            .iter()
            .map(|&(priority, name)| {
                let order = Arc::clone(&order);
                scheduler.submit(priority, move |_| order.lock().push(name))
            })
            .collect();
        assert_eq!(scheduler.pending(), 5);

        drop(release);
        blocker.wait().unwrap();
        for h in handles {
            h.wait().unwrap();
        }
        assert_eq!(
            *order.lock(),
            vec!["highest", "high", "normal-1", "normal-2", "low"]
        );
    }

    #[test]
    fn test_cancelled_before_start_never_runs() {
        let scheduler = JobScheduler::new(1).unwrap();
        let (release, blocker) = occupy(&scheduler);

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = scheduler.submit(JobPriority::Normal, move |_| flag.store(true, Ordering::SeqCst));
        handle.cancel();
        let after = scheduler.submit(JobPriority::Low, |_| 7);

        drop(release);
        blocker.wait().unwrap();
        assert_eq!(after.wait().unwrap(), 7);
        assert!(handle.is_finished());
        assert!(matches!(handle.wait(), Err(TerrainError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_running_job_observes_token() {
        let scheduler = JobScheduler::new(2).unwrap();
        let handle = scheduler.submit(JobPriority::Normal, |token| {
            let start = Instant::now();
            while !token.is_cancelled() {
                if start.elapsed() > Duration::from_secs(10) {
                    return false;
                }
                thread::sleep(Duration::from_millis(1));
            }
            true
        });
        assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
        handle.cancel();
        assert!(handle.wait().unwrap());
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let scheduler = JobScheduler::new(1).unwrap();
        let failing = scheduler.submit(JobPriority::Highest, |_| -> u32 { panic!("boom") });
        let next = scheduler.submit(JobPriority::Normal, |_| 7u32);

        match failing.wait_timeout(Duration::from_secs(10)) {
            Some(Err(TerrainError::JobPanicked(message))) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(next.wait_timeout(Duration::from_secs(10)).unwrap().unwrap(), 7);

        // Formatted payloads arrive as String.
        let formatted = scheduler.submit(JobPriority::Normal, |_| -> u8 { panic!("cell {}", 3) });
        assert!(matches!(formatted.wait(), Err(TerrainError::JobPanicked(m)) if m == "cell 3"));
        assert_eq!(scheduler.submit(JobPriority::Low, |_| 1u8).wait().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_discards_queue() {
        let scheduler = JobScheduler::new(1).unwrap();
        let (release, blocker) = occupy(&scheduler);
        let queued = scheduler.submit(JobPriority::Normal, |_| ());
        scheduler.shutdown();
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(queued.wait(), Err(TerrainError::Cancelled)));

        let late = scheduler.submit(JobPriority::Highest, |_| ());
        assert!(matches!(late.try_wait(), Some(Err(TerrainError::Cancelled))));

        drop(release);
        blocker.wait().unwrap();
    }
}
