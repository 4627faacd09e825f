use std::fmt;

use tokio::sync::oneshot;

/// Invoked by a worker once a job's write has finished, successful or not.
pub type CompletionCallback = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

/// An immutable blob to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bucket: String,
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: &'static str,
    /// Immutable artifacts are written once and cached forever; mutable
    /// ones are overwritten on every publish.
    pub immutable: bool,
}

impl Artifact {
    /// A content-addressed artifact.
    pub fn immutable(
        bucket: impl Into<String>,
        name: impl Into<String>,
        content: Vec<u8>,
        content_type: &'static str,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            content,
            content_type,
            immutable: true,
        }
    }

    /// An artifact stored under a stable logical name.
    pub fn mutable(
        bucket: impl Into<String>,
        name: impl Into<String>,
        content: Vec<u8>,
        content_type: &'static str,
    ) -> Self {
        Self {
            immutable: false,
            ..Self::immutable(bucket, name, content, content_type)
        }
    }
}

/// Result of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// A new object was written.
    Stored,
    /// An identically named immutable object already existed.
    Unchanged,
    /// The write failed; the error is kept by the store.
    Failed,
}

impl JobOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, JobOutcome::Failed)
    }
}

/// A queued upload.
pub struct UploadJob {
    pub artifact: Artifact,
    /// Counts toward the `total`/`done`/`unchanged` progress counters.
    pub counts: bool,
    /// Emits a progress snapshot when queued and when finished.
    pub broadcasts: bool,
    pub on_done: Option<CompletionCallback>,
}

impl UploadJob {
    /// A job that is neither counted nor broadcast.
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            counts: false,
            broadcasts: false,
            on_done: None,
        }
    }

    /// A job that is counted and broadcast.
    pub fn counted(artifact: Artifact) -> Self {
        Self {
            counts: true,
            broadcasts: true,
            ..Self::new(artifact)
        }
    }

    /// Sets the completion callback, chaining after any existing one.
    pub fn on_done(mut self, callback: impl FnOnce(JobOutcome) + Send + 'static) -> Self {
        self.on_done = Some(match self.on_done.take() {
            Some(previous) => Box::new(move |outcome| {
                previous(outcome);
                callback(outcome);
            }),
            None => Box::new(callback),
        });
        self
    }

    /// Returns the job together with a receiver resolved with its outcome.
    pub fn with_receipt(self) -> (Self, oneshot::Receiver<JobOutcome>) {
        let (tx, rx) = oneshot::channel();
        let job = self.on_done(move |outcome| {
            let _ = tx.send(outcome);
        });
        (job, rx)
    }
}

impl fmt::Debug for UploadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadJob")
            .field("bucket", &self.artifact.bucket)
            .field("name", &self.artifact.name)
            .field("immutable", &self.artifact.immutable)
            .field("counts", &self.counts)
            .field("broadcasts", &self.broadcasts)
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}
