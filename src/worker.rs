//! Background worker for clustering passes.
//!
//! Passes are expensive (density clustering is quadratic in the number of
//! dimensions), so callers hand them to a worker thread and keep their own
//! thread responsive. Communication is message based:
//!
//! ```text
//! caller ──WorkerRequest{id, job}──▶ worker thread ──WorkerResponse{id, outcome}──▶ caller
//! ```
//!
//! Only the newest request of each [`JobKind`] matters. The worker skips
//! queued requests that have been superseded, and results of superseded
//! requests are discarded on both sides.

use crate::config::Settings;
use crate::core::pipeline::{aggregate, aggregate_with_fallback, AggregatedView};
use crate::core::temporal::cluster_over_time;
use crate::core::types::{ClusterView, Row};
use crate::stats::SharedProcessingStats;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

/// Identifier of a submitted request; increases with every submission.
pub type RequestId = u64;

/// Capacity of the request queue.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// How long the worker waits for a request before re-checking its state.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Kinds of work, each superseded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Aggregate,
    Timeline,
}

/// Work to perform. Row buffers are shared snapshots, not copies.
#[derive(Debug, Clone)]
pub enum Job {
    /// One primary pass over the buffer
    Aggregate {
        rows: Arc<[Row]>,
        dimensions: Arc<[String]>,
        settings: Settings,
        /// Replace inconsistent groupings with a single group
        fallback: bool,
    },
    /// A timeline over the whole buffer
    Timeline {
        rows: Arc<[Row]>,
        dimensions: Arc<[String]>,
        settings: Settings,
        context_window: Option<usize>,
    },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Aggregate { .. } => JobKind::Aggregate,
            Job::Timeline { .. } => JobKind::Timeline,
        }
    }
}

/// A request as it travels to the worker thread.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub id: RequestId,
    pub job: Job,
}

/// Result of a job.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Aggregated(AggregatedView),
    Timeline(Vec<ClusterView>),
}

/// A response as it travels back to the caller.
#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub id: RequestId,
    pub kind: JobKind,
    pub outcome: JobOutcome,
}

/// Newest issued request id per job kind, shared by caller and worker.
#[derive(Debug, Default)]
pub struct LatestRequests {
    aggregate: AtomicU64,
    timeline: AtomicU64,
}

impl LatestRequests {
    fn slot(&self, kind: JobKind) -> &AtomicU64 {
        match kind {
            JobKind::Aggregate => &self.aggregate,
            JobKind::Timeline => &self.timeline,
        }
    }

    /// Mark `id` as the newest request of `kind`.
    pub fn issue(&self, kind: JobKind, id: RequestId) {
        self.slot(kind).fetch_max(id, Ordering::SeqCst);
    }

    /// Whether `id` is still the newest request of `kind`.
    pub fn is_current(&self, kind: JobKind, id: RequestId) -> bool {
        self.slot(kind).load(Ordering::SeqCst) == id
    }
}

/// Errors of the worker handle.
#[derive(Debug)]
pub enum WorkerError {
    AlreadyRunning,
    NotRunning,
    /// The worker thread went away
    Disconnected,
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::AlreadyRunning => write!(f, "Worker is already running"),
            WorkerError::NotRunning => write!(f, "Worker is not running"),
            WorkerError::Disconnected => write!(f, "Worker disconnected unexpectedly"),
        }
    }
}

impl std::error::Error for WorkerError {}

/// Handle to the clustering worker thread.
pub struct ClusteringWorker {
    /// Identifies this worker in logs
    instance_id: Uuid,
    requests: Option<Sender<WorkerRequest>>,
    responses: Option<Receiver<WorkerResponse>>,
    latest: Arc<LatestRequests>,
    next_id: RequestId,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    stats: SharedProcessingStats,
}

impl ClusteringWorker {
    /// Create a stopped worker that reports into `stats`.
    pub fn new(stats: SharedProcessingStats) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            requests: None,
            responses: None,
            latest: Arc::new(LatestRequests::default()),
            next_id: 0,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            stats,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Spawn the worker thread.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(WorkerError::AlreadyRunning);
        }

        let (request_tx, request_rx) = bounded(REQUEST_QUEUE_CAPACITY);
        let (response_tx, response_rx) = unbounded();

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let latest = self.latest.clone();
        let stats = self.stats.clone();
        let instance_id = self.instance_id;

        let handle = thread::spawn(move || {
            tracing::debug!(%instance_id, "Clustering worker started");
            run_worker_loop(request_rx, response_tx, latest, running.clone(), stats);
            running.store(false, Ordering::SeqCst);
            tracing::debug!(%instance_id, "Clustering worker stopped");
        });

        self.requests = Some(request_tx);
        self.responses = Some(response_rx);
        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Queue a job. Any earlier job of the same kind becomes stale.
    pub fn submit(&mut self, job: Job) -> Result<RequestId, WorkerError> {
        let sender = self.requests.as_ref().ok_or(WorkerError::NotRunning)?;

        self.next_id += 1;
        let id = self.next_id;
        let kind = job.kind();
        self.latest.issue(kind, id);

        sender
            .send(WorkerRequest { id, job })
            .map_err(|_| WorkerError::Disconnected)?;
        tracing::debug!(id, ?kind, "Submitted clustering request");
        Ok(id)
    }

    /// Receive the next current response without blocking.
    ///
    /// Stale responses are dropped on the way.
    pub fn try_recv(&self) -> Option<WorkerResponse> {
        let responses = self.responses.as_ref()?;
        while let Ok(response) = responses.try_recv() {
            if self.accept(&response) {
                return Some(response);
            }
        }
        None
    }

    /// Wait up to `timeout` for the next current response.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkerResponse>, WorkerError> {
        let responses = self.responses.as_ref().ok_or(WorkerError::NotRunning)?;
        let deadline = std::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match responses.recv_timeout(remaining) {
                Ok(response) => {
                    if self.accept(&response) {
                        return Ok(Some(response));
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }

    /// Whether a response still belongs to the newest request of its kind.
    pub fn is_current(&self, response: &WorkerResponse) -> bool {
        self.latest.is_current(response.kind, response.id)
    }

    fn accept(&self, response: &WorkerResponse) -> bool {
        if self.is_current(response) {
            true
        } else {
            tracing::debug!(id = response.id, kind = ?response.kind, "Discarding stale result");
            self.stats.record_superseded();
            false
        }
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the sender wakes the worker with a disconnect.
        self.requests = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.responses = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ClusteringWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker_loop(
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
    latest: Arc<LatestRequests>,
    running: Arc<AtomicBool>,
    stats: SharedProcessingStats,
) {
    while running.load(Ordering::SeqCst) {
        let first = match requests.recv_timeout(POLL_INTERVAL) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut pending = vec![first];
        pending.extend(requests.try_iter());

        for request in pending {
            let kind = request.job.kind();
            if !latest.is_current(kind, request.id) {
                tracing::debug!(id = request.id, ?kind, "Skipping superseded request");
                stats.record_superseded();
                continue;
            }

            let outcome = execute(request.job, &stats);

            // A newer request may have arrived while this one was computing.
            if !latest.is_current(kind, request.id) {
                tracing::debug!(id = request.id, ?kind, "Dropping result of superseded request");
                stats.record_superseded();
                continue;
            }

            let response = WorkerResponse {
                id: request.id,
                kind,
                outcome,
            };
            if responses.send(response).is_err() {
                return;
            }
        }
    }
}

fn execute(job: Job, stats: &SharedProcessingStats) -> JobOutcome {
    match job {
        Job::Aggregate {
            rows,
            dimensions,
            settings,
            fallback,
        } => {
            let view = if fallback {
                aggregate_with_fallback(&rows, &dimensions, &settings)
            } else {
                aggregate(&rows, &dimensions, &settings)
            };
            stats.record_aggregation(view.anomaly.is_some(), view.fell_back);
            JobOutcome::Aggregated(view)
        }
        Job::Timeline {
            rows,
            dimensions,
            settings,
            context_window,
        } => {
            let views = cluster_over_time(&rows, &dimensions, &settings, context_window);
            stats.record_timeline();
            JobOutcome::Timeline(views)
        }
    }
}
