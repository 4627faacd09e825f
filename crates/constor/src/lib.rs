//! Concurrent content store.
//!
//! Uploads artifacts to a [`BlobStore`](hashpub_storage::BlobStore) from a
//! fixed pool of workers. Immutable artifacts are named by their content
//! hash and written without overwrite, so storing the same content twice
//! is a no-op that is counted as "unchanged" rather than "done".
//!
//! # Lifecycle
//!
//! 1. [`ContentStore::open`] spawns the workers.
//! 2. Producers call [`ContentStore::submit`]; a full queue applies back-pressure.
//! 3. [`ContentStore::wait`] resolves once every submitted job has run and
//!    returns the first upload error, if any.
//! 4. [`ContentStore::close`] (or dropping the handle) lets the workers
//!    drain the queue and exit.

mod barrier;
mod job;
mod sink;
mod store;

use std::sync::Arc;

pub use barrier::CompletionBarrier;
pub use job::{Artifact, CompletionCallback, JobOutcome, UploadJob};
pub use sink::ProgressSink;
pub use store::{ContentStore, Counters};

use hashpub_storage::StorageError;

/// Maximum number of queued jobs before `submit` waits for a free slot.
pub const QUEUE_CAPACITY: usize = 1000;

/// Errors produced by the content store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConstorError {
    #[error("content store is closed")]
    Closed,

    #[error("storing {bucket}/{name} failed: {source}")]
    Upload {
        bucket: String,
        name: String,
        source: Arc<StorageError>,
    },
}
