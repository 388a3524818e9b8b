//! Verification pipeline.
//!
//! A [`Verifier`] checks a manifest's entries on one background worker
//! thread, one file at a time in manifest order. The controlling thread never
//! blocks on the worker: it calls [`Verifier::tick`] periodically (or lets
//! [`Verifier::run`] do so) to collect status changes in bounded batches,
//! emit progress and deliver the completion signal.
//!
//! Only three things are shared with the worker: the bytes-verified counter
//! and the cancellation flag (both atomics) and the pending status queue
//! (behind a mutex).

use crate::checksums::{HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE};
use crate::error::VerificationError;
use crate::manifest::{EntryStatus, EntryTarget, Manifest, StatusCounts};
use crate::progress::{Progress, SessionOutcome, StatusChange, VerificationSummary, VerifyListener};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_STATUS_BATCH_SIZE: usize = 100;
pub const DEFAULT_SPEED_SMOOTHING: f64 = 0.9;

/// Marks "no entry in flight" in the shared current-entry slot.
const NO_ENTRY: usize = usize::MAX;

/// Tuning for verification sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
    /// Bytes read from a file per hash update
    pub chunk_size: usize,
    /// Minimum time between progress events
    pub progress_interval: Duration,
    /// Maximum status changes delivered per tick
    pub status_batch_size: usize,
    /// Weight of the previous speed estimate, in `0.0..=1.0`
    pub speed_smoothing: f64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            status_batch_size: DEFAULT_STATUS_BATCH_SIZE,
            speed_smoothing: DEFAULT_SPEED_SMOOTHING,
        }
    }
}

impl VerifyOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.normalized()
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self.normalized()
    }

    pub fn with_status_batch_size(mut self, batch_size: usize) -> Self {
        self.status_batch_size = batch_size;
        self.normalized()
    }

    pub fn with_speed_smoothing(mut self, smoothing: f64) -> Self {
        self.speed_smoothing = smoothing;
        self.normalized()
    }

    /// Clamp every field into its usable range.
    fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.progress_interval = self.progress_interval.max(Duration::from_millis(1));
        self.status_batch_size = self.status_batch_size.max(1);
        self.speed_smoothing = if self.speed_smoothing.is_nan() {
            DEFAULT_SPEED_SMOOTHING
        } else {
            self.speed_smoothing.clamp(0.0, 1.0)
        };
        self
    }
}

/// Requests cancellation of one session. Cheap to clone and `Send`.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Identifies a started session and allows cancelling it from any thread.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancelHandle,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// Whether a verifier has a session in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// State touched by both the worker and the controlling thread.
#[derive(Debug)]
struct SharedState {
    bytes_verified: AtomicU64,
    files_done: AtomicUsize,
    current: AtomicUsize,
    /// Worker stopped because of cancellation
    stopped_early: AtomicBool,
    /// Set with `Release` after the worker's last push
    finished: AtomicBool,
    pending: Mutex<VecDeque<StatusChange>>,
}

impl SharedState {
    fn new() -> Self {
        SharedState {
            bytes_verified: AtomicU64::new(0),
            files_done: AtomicUsize::new(0),
            current: AtomicUsize::new(NO_ENTRY),
            stopped_early: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<StatusChange>> {
        // The queue holds plain values, so a panic elsewhere cannot leave it inconsistent.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, change: StatusChange) {
        self.lock_pending().push_back(change);
    }

    /// Remove up to `max` changes from the front of the queue.
    /// Returns the batch and whether the queue is now empty.
    fn drain(&self, max: usize) -> (Vec<StatusChange>, bool) {
        let mut pending = self.lock_pending();
        let count = pending.len().min(max);
        let batch: Vec<StatusChange> = pending.drain(..count).collect();
        (batch, pending.is_empty())
    }
}

/// Everything the background thread needs; owned by it for the session.
struct Worker {
    session_id: Uuid,
    algorithm: HashAlgorithm,
    chunk_size: usize,
    work: Vec<(usize, Arc<EntryTarget>)>,
    shared: Arc<SharedState>,
    cancel: CancelHandle,
    // Dropped when the worker returns, waking `Verifier::run`.
    _done: Sender<()>,
}

impl Worker {
    fn run(self) {
        let span = info_span!("verify_session", id = %self.session_id);
        let _enter = span.enter();
        debug!(entries = self.work.len(), algorithm = %self.algorithm, "Worker started");

        let mut buffer = vec![0u8; self.chunk_size];

        for (index, target) in &self.work {
            if self.cancel.is_cancelled() {
                self.shared.stopped_early.store(true, Ordering::Relaxed);
                break;
            }

            self.shared.current.store(*index, Ordering::Relaxed);
            let status = self.verify_entry(target, &mut buffer);
            debug!(index = *index, path = %target.relative_path, status = ?status, "Entry verified");

            if status == EntryStatus::NotVerified {
                self.shared.stopped_early.store(true, Ordering::Relaxed);
            }
            self.shared.push(StatusChange {
                index: *index,
                status,
            });
            self.shared.files_done.fetch_add(1, Ordering::Relaxed);

            if status == EntryStatus::NotVerified {
                break;
            }
        }

        self.shared.current.store(NO_ENTRY, Ordering::Relaxed);
        self.shared.finished.store(true, Ordering::Release);
        debug!("Worker finished");
    }

    /// Stream one file through a fresh engine and decide its status.
    fn verify_entry(&self, target: &EntryTarget, buffer: &mut [u8]) -> EntryStatus {
        let mut file = match File::open(&target.resolved_path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %target.resolved_path.display(), error = %e, "Failed to open file");
                return EntryStatus::NotFound;
            }
        };

        let mut hasher = Hasher::new(self.algorithm);
        loop {
            if self.cancel.is_cancelled() {
                return EntryStatus::NotVerified;
            }
            match file.read(buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                    self.shared
                        .bytes_verified
                        .fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(path = %target.resolved_path.display(), error = %e, "Failed to read file");
                    return EntryStatus::NotFound;
                }
            }
        }

        if hasher.finalize().matches(&target.expected_digest) {
            EntryStatus::Good
        } else {
            EntryStatus::Bad
        }
    }
}

/// Controller-side bookkeeping for the active session.
struct Session {
    id: Uuid,
    manifest_id: Uuid,
    shared: Arc<SharedState>,
    cancel: CancelHandle,
    worker: Option<JoinHandle<()>>,
    done: Receiver<()>,
    targets: Vec<Arc<EntryTarget>>,
    statuses: Vec<EntryStatus>,
    bytes_total: u64,
    started_at: Instant,
    last_progress_at: Instant,
    last_bytes: u64,
    speed: f64,
    replaced_warned: bool,
}

impl Session {
    fn progress(&mut self, now: Instant, smoothing: f64) -> Progress {
        let bytes = self.shared.bytes_verified.load(Ordering::Relaxed);
        let elapsed = now.duration_since(self.last_progress_at).as_secs_f64();
        let instantaneous = if elapsed > 0.0 {
            bytes.saturating_sub(self.last_bytes) as f64 / 1024.0 / elapsed
        } else {
            0.0
        };
        self.speed = smooth_speed(self.speed, instantaneous, smoothing);
        self.last_bytes = bytes;
        self.last_progress_at = now;

        let current = self.shared.current.load(Ordering::Relaxed);
        let current_index = (current != NO_ENTRY).then_some(current);

        Progress {
            fraction: fraction(bytes, self.bytes_total),
            speed_kib_per_sec: self.speed,
            files_done: self.shared.files_done.load(Ordering::Relaxed),
            files_total: self.targets.len(),
            bytes_verified: bytes,
            bytes_total: self.bytes_total,
            current_index,
            current_path: current_index
                .and_then(|i| self.targets.get(i))
                .map(|t| t.relative_path.clone()),
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!(session = %self.id, "Verification worker panicked");
            }
        }
    }

    fn summary(&self, outcome: SessionOutcome) -> VerificationSummary {
        let mut counts = StatusCounts::default();
        for status in &self.statuses {
            counts.add(*status);
        }
        VerificationSummary {
            session_id: self.id,
            outcome,
            counts,
            files_total: self.targets.len(),
            bytes_verified: self.shared.bytes_verified.load(Ordering::Relaxed),
            bytes_total: self.bytes_total,
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
            self.join_worker();
        }
    }
}

/// Runs verification sessions over manifests, one at a time.
///
/// # Example
///
/// ```no_run
/// use sumcheck_engine::{load_manifest, Verifier};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manifest = load_manifest("release.sha256")?;
/// let mut verifier = Verifier::default();
/// verifier.start(&manifest)?;
/// if let Some(summary) = verifier.run(&mut manifest, &mut ()) {
///     println!("{} good, {} bad", summary.counts.good, summary.counts.bad);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Verifier {
    options: VerifyOptions,
    session: Option<Session>,
}

impl Verifier {
    pub fn new(options: VerifyOptions) -> Self {
        Verifier {
            options: options.normalized(),
            session: None,
        }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Start verifying every entry of `manifest` on a background thread.
    ///
    /// Entries keep their current status until the worker reports on them.
    /// If none of the entries names an existing regular file, no worker is
    /// started and the next `tick` completes the session. The shortcut looks
    /// at file existence rather than the byte total, so a manifest listing
    /// only empty files is still verified and each entry gets a result.
    ///
    /// # Errors
    /// - `UnknownAlgorithm` if no manifest has been loaded
    /// - `AlreadyRunning` if a session is still active
    /// - `WorkerSpawn` if the worker thread cannot be created
    pub fn start(&mut self, manifest: &Manifest) -> Result<SessionHandle, VerificationError> {
        let algorithm = manifest
            .algorithm()
            .ok_or(VerificationError::UnknownAlgorithm)?;
        if self.session.is_some() {
            return Err(VerificationError::AlreadyRunning);
        }

        let session_id = Uuid::new_v4();
        let targets: Vec<Arc<EntryTarget>> = manifest
            .entries()
            .iter()
            .map(|entry| Arc::clone(entry.target()))
            .collect();

        let mut bytes_total = 0u64;
        let mut present = 0usize;
        for target in &targets {
            if let Ok(metadata) = fs::metadata(&target.resolved_path) {
                if metadata.is_file() {
                    bytes_total += metadata.len();
                    present += 1;
                }
            }
        }

        let shared = Arc::new(SharedState::new());
        let cancel = CancelHandle::default();
        let (done_tx, done_rx) = bounded::<()>(0);

        let worker = if present == 0 {
            info!(session = %session_id, entries = targets.len(), "Nothing to verify");
            shared.finished.store(true, Ordering::Release);
            drop(done_tx);
            None
        } else {
            let worker = Worker {
                session_id,
                algorithm,
                chunk_size: self.options.chunk_size,
                work: targets.iter().cloned().enumerate().collect(),
                shared: Arc::clone(&shared),
                cancel: cancel.clone(),
                _done: done_tx,
            };
            let handle = thread::Builder::new()
                .name("sumcheck-verify".to_string())
                .spawn(move || worker.run())
                .map_err(|source| VerificationError::WorkerSpawn { source })?;
            Some(handle)
        };

        info!(
            session = %session_id,
            algorithm = %algorithm,
            files = targets.len(),
            bytes = bytes_total,
            "Verification started"
        );

        let now = Instant::now();
        self.session = Some(Session {
            id: session_id,
            manifest_id: manifest.id(),
            shared,
            cancel: cancel.clone(),
            worker,
            done: done_rx,
            statuses: manifest.entries().iter().map(|e| e.status()).collect(),
            targets,
            bytes_total,
            started_at: now,
            last_progress_at: now,
            last_bytes: 0,
            speed: 0.0,
            replaced_warned: false,
        });

        Ok(SessionHandle {
            id: session_id,
            cancel,
        })
    }

    /// Request cancellation of the active session, if any.
    ///
    /// Entries already decided keep their status; the in-flight entry
    /// becomes `NotVerified`; entries not yet reached are left untouched.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }

    /// Cancellation handle for the active session, usable from other threads.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.session.as_ref().map(|s| s.cancel.clone())
    }

    /// Advance the active session without blocking.
    ///
    /// Emits progress if the interval has elapsed, applies at most one batch
    /// of status changes to `manifest` and forwards it, and delivers the
    /// completion signal once the worker has finished and the queue is empty.
    pub fn tick(&mut self, manifest: &mut Manifest, listener: &mut dyn VerifyListener) -> SessionState {
        self.step(manifest, listener);
        self.state()
    }

    /// Drive the active session to completion, blocking the caller.
    ///
    /// Returns the summary also passed to `on_complete`, or `None` if no
    /// session was started.
    pub fn run(
        &mut self,
        manifest: &mut Manifest,
        listener: &mut dyn VerifyListener,
    ) -> Option<VerificationSummary> {
        let done = self.session.as_ref()?.done.clone();
        let ticker = tick(self.options.progress_interval);

        loop {
            if let Some(summary) = self.step(manifest, listener) {
                return Some(summary);
            }
            select! {
                recv(ticker) -> _ => {}
                recv(done) -> _ => {}
            }
        }
    }

    fn step(
        &mut self,
        manifest: &mut Manifest,
        listener: &mut dyn VerifyListener,
    ) -> Option<VerificationSummary> {
        let session = self.session.as_mut()?;
        // Read before draining: every change pushed before `finished` is then visible.
        let finished = session.shared.finished.load(Ordering::Acquire);

        let now = Instant::now();
        if !finished && now.duration_since(session.last_progress_at) >= self.options.progress_interval {
            let progress = session.progress(now, self.options.speed_smoothing);
            if progress.fraction < 1.0 {
                listener.on_progress(&progress);
            }
        }

        let (batch, drained) = session.shared.drain(self.options.status_batch_size);
        if !batch.is_empty() {
            for change in &batch {
                if let Some(status) = session.statuses.get_mut(change.index) {
                    *status = change.status;
                }
            }

            if manifest.id() == session.manifest_id {
                for change in &batch {
                    manifest.set_status(change.index, change.status);
                }
                listener.on_status_batch(&batch);
            } else if !session.replaced_warned {
                warn!(
                    session = %session.id,
                    "Manifest was replaced during verification; discarding status updates"
                );
                session.replaced_warned = true;
            }
        }

        if !(finished && drained) {
            return None;
        }

        let mut session = self.session.take()?;
        session.join_worker();

        let outcome = if session.shared.stopped_early.load(Ordering::Relaxed) {
            SessionOutcome::Cancelled
        } else {
            SessionOutcome::Completed
        };
        let summary = session.summary(outcome);

        info!(
            session = %summary.session_id,
            outcome = ?outcome,
            good = summary.counts.good,
            bad = summary.counts.bad,
            not_found = summary.counts.not_found,
            elapsed_secs = summary.elapsed_secs,
            "Verification finished"
        );

        if outcome == SessionOutcome::Cancelled {
            listener.on_cancelled();
        }
        listener.on_complete(&summary);
        Some(summary)
    }
}

/// Exponential moving average of throughput.
fn smooth_speed(previous: f64, instantaneous: f64, smoothing: f64) -> f64 {
    smoothing * previous + (1.0 - smoothing) * instantaneous
}

fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).min(1.0)
    }
}
