use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use hashpub_protocol::Storing;
use hashpub_storage::{BlobStore, WriteOptions};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::job::{JobOutcome, UploadJob};
use crate::sink::ProgressSink;
use crate::{ConstorError, QUEUE_CAPACITY};

/// Point-in-time view of the progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Counted jobs accepted by `submit`.
    pub total: usize,
    /// Counted jobs that wrote a new object.
    pub done: usize,
    /// Counted jobs whose object already existed.
    pub unchanged: usize,
}

impl Counters {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.done + self.unchanged)
    }
}

/// State shared by the handle and every worker.
struct Shared {
    backend: Arc<dyn BlobStore>,
    sink: ProgressSink,
    total: AtomicUsize,
    done: AtomicUsize,
    unchanged: AtomicUsize,
    /// First upload error of the session; later errors are dropped.
    error: OnceLock<ConstorError>,
    /// Jobs accepted but not yet finished.
    pending: watch::Sender<usize>,
}

impl Shared {
    fn counters(&self) -> Counters {
        // Read the completion counters before the total so that
        // `remaining` never goes negative for a consistent session.
        let done = self.done.load(Ordering::Acquire);
        let unchanged = self.unchanged.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        Counters {
            total,
            done,
            unchanged,
        }
    }

    fn broadcast(&self) {
        let c = self.counters();
        self.sink.send(Storing::snapshot(c.done, c.unchanged, c.remaining()));
    }

    async fn process(&self, job: UploadJob) {
        let _pending = PendingGuard(&self.pending);
        let UploadJob {
            artifact,
            counts,
            broadcasts,
            on_done,
        } = job;

        let options = if artifact.immutable {
            WriteOptions::immutable(artifact.content_type)
        } else {
            WriteOptions::mutable(artifact.content_type)
        };

        let result = self
            .backend
            .write(&artifact.bucket, &artifact.name, &artifact.content, options)
            .await;
        let outcome = match result {
            Ok(true) => {
                if counts {
                    self.done.fetch_add(1, Ordering::AcqRel);
                }
                debug!(bucket = %artifact.bucket, name = %artifact.name, "stored artifact");
                JobOutcome::Stored
            }
            Ok(false) => {
                if counts {
                    self.unchanged.fetch_add(1, Ordering::AcqRel);
                }
                debug!(bucket = %artifact.bucket, name = %artifact.name, "artifact unchanged");
                JobOutcome::Unchanged
            }
            Err(e) => {
                warn!(
                    bucket = %artifact.bucket,
                    name = %artifact.name,
                    error = %e,
                    "artifact upload failed"
                );
                let _ = self.error.set(ConstorError::Upload {
                    bucket: artifact.bucket,
                    name: artifact.name,
                    source: Arc::new(e),
                });
                JobOutcome::Failed
            }
        };

        if let Some(on_done) = on_done {
            // A panicking callback must not take the worker down with it.
            if panic::catch_unwind(AssertUnwindSafe(|| on_done(outcome))).is_err() {
                error!(?outcome, "completion callback panicked");
            }
        }
        if broadcasts {
            self.broadcast();
        }
    }
}

/// Decrements the pending-job count when dropped.
struct PendingGuard<'a>(&'a watch::Sender<usize>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle to a pool of upload workers.
///
/// One handle serves a whole publishing session; it may be shared by
/// reference between concurrent producers.
pub struct ContentStore {
    shared: Arc<Shared>,
    queue: Mutex<Option<mpsc::Sender<UploadJob>>>,
    workers: Vec<JoinHandle<()>>,
}

impl ContentStore {
    /// Spawns `workers` upload tasks (at least one) on the current tokio runtime.
    pub fn open(backend: Arc<dyn BlobStore>, sink: ProgressSink, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<UploadJob>(QUEUE_CAPACITY);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let (pending, _) = watch::channel(0usize);

        let shared = Arc::new(Shared {
            backend,
            sink,
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            unchanged: AtomicUsize::new(0),
            error: OnceLock::new(),
            pending,
        });

        let workers = (0..workers.max(1))
            .map(|id| {
                let shared = Arc::clone(&shared);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else {
                            break;
                        };
                        shared.process(job).await;
                    }
                    debug!(worker = id, "upload worker exiting");
                })
            })
            .collect();

        Self {
            shared,
            queue: Mutex::new(Some(tx)),
            workers,
        }
    }

    /// Queues a job, waiting for a free slot if the queue is full.
    ///
    /// Counted jobs bump `total` before they are queued, so observers see
    /// the total grow ahead of completion.
    pub async fn submit(&self, job: UploadJob) -> Result<(), ConstorError> {
        let tx = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConstorError::Closed)?;
        let permit = tx.reserve().await.map_err(|_| ConstorError::Closed)?;

        self.shared.pending.send_modify(|n| *n += 1);
        if job.counts {
            self.shared.total.fetch_add(1, Ordering::AcqRel);
        }
        if job.broadcasts {
            self.shared.broadcast();
        }
        permit.send(job);
        Ok(())
    }

    /// Stops accepting jobs. Queued and in-flight jobs still run.
    pub fn close(&self) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Waits until every accepted job has finished.
    ///
    /// Returns the first upload error of the session. An error does not
    /// stop other jobs; they all run before this resolves.
    pub async fn wait(&self) -> Result<(), ConstorError> {
        let mut pending = self.shared.pending.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail.
        let _ = pending.wait_for(|n| *n == 0).await;
        match self.shared.error.get() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Current progress counters.
    pub fn counters(&self) -> Counters {
        self.shared.counters()
    }

    /// Number of worker tasks.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
