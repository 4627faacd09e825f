use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::{BlobStore, StorageError, WriteOptions, encode_name, validate_bucket, validate_name};

/// Prefix of in-progress files inside a bucket directory.
const TEMP_PREFIX: &str = ".tmp-";

/// Blob store backed by a local directory.
///
/// Each bucket is a directory under `root`; each object is one file named
/// by the percent-encoded object name. Content type and cache-control are
/// not persisted.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path of an object.
    pub fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf, StorageError> {
        validate_bucket(bucket)?;
        validate_name(name)?;
        Ok(self.root.join(bucket).join(encode_name(name)))
    }

    async fn write_object(
        &self,
        bucket: &str,
        name: &str,
        data: &[u8],
        overwrite: bool,
    ) -> Result<bool, StorageError> {
        let target = self.object_path(bucket, name)?;
        let dir = self.root.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;

        // Stage the full contents first so the target name only ever
        // points at a complete file.
        let temp = dir.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp, data).await?;

        let result = if overwrite {
            tokio::fs::rename(&temp, &target).await.map(|()| true)
        } else {
            // hard_link fails if the target exists: create-if-absent in one step.
            let linked = match tokio::fs::hard_link(&temp, &target).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e),
            };
            let _ = tokio::fs::remove_file(&temp).await;
            linked
        };

        match result {
            Ok(stored) => {
                debug!(bucket, name, stored, path = %target.display(), "local write");
                Ok(stored)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                Err(e.into())
            }
        }
    }
}

impl BlobStore for LocalStore {
    fn exists<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            let path = self.object_path(bucket, name)?;
            Ok(tokio::fs::try_exists(path).await?)
        })
    }

    fn write<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
        data: &'a [u8],
        options: WriteOptions<'a>,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(self.write_object(bucket, name, data, options.overwrite))
    }

    fn read<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, StorageError>> {
        Box::pin(async move {
            let path = self.object_path(bucket, name)?;
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}
