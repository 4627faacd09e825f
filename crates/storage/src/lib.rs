//! Blob store interface and backends.
//!
//! A blob store keeps opaque byte objects addressed by `(bucket, name)`.
//! The publisher only needs three operations: an existence check, a write
//! that can refuse to overwrite, and a read.

mod local;
mod memory;
mod validation;

pub use local::LocalStore;
pub use memory::{MemoryStore, StoredObject};
pub use validation::{encode_name, validate_bucket, validate_name};

use futures_util::future::BoxFuture;

/// Cache-Control for content-addressed objects that never change.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public,max-age=31536000,immutable";

/// Cache-Control for objects that are overwritten on every publish.
pub const MUTABLE_CACHE_CONTROL: &str = "no-cache";

pub const MIME_JS: &str = "application/javascript";
pub const MIME_HTML: &str = "text/html";
pub const MIME_JSON: &str = "application/json";

/// Errors produced by blob store backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bucket: {0}")]
    InvalidBucket(String),

    #[error("invalid object name: {0}")]
    InvalidName(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// How an object is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions<'a> {
    /// When false, an existing object with the same name is left untouched
    /// and the write reports that nothing new was stored.
    pub overwrite: bool,
    pub content_type: &'a str,
    pub cache_control: &'a str,
}

impl<'a> WriteOptions<'a> {
    /// Write-once, long-lived caching.
    pub fn immutable(content_type: &'a str) -> Self {
        Self {
            overwrite: false,
            content_type,
            cache_control: IMMUTABLE_CACHE_CONTROL,
        }
    }

    /// Always overwrite, never cache.
    pub fn mutable(content_type: &'a str) -> Self {
        Self {
            overwrite: true,
            content_type,
            cache_control: MUTABLE_CACHE_CONTROL,
        }
    }
}

/// Abstract blob store.
///
/// Implementations must make each object write atomic: a concurrent
/// existence check or read never observes a partially written object.
pub trait BlobStore: Send + Sync {
    /// Reports whether `(bucket, name)` exists.
    fn exists<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, StorageError>>;

    /// Writes an object. Returns `true` if a new object was stored and
    /// `false` if `overwrite` was off and the object already existed.
    fn write<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
        data: &'a [u8],
        options: WriteOptions<'a>,
    ) -> BoxFuture<'a, Result<bool, StorageError>>;

    /// Reads an object. Returns `None` if it does not exist.
    fn read<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, StorageError>>;
}
