use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures_util::future::BoxFuture;

use crate::{BlobStore, StorageError, WriteOptions};

/// An object held by [`MemoryStore`], with the metadata it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// In-process blob store.
///
/// The existence check and insert of a non-overwriting write happen under
/// one lock, so concurrent writers of the same name store it exactly once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of an object.
    pub fn get(&self, bucket: &str, name: &str) -> Option<StoredObject> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.get(&(bucket.to_string(), name.to_string())).cloned()
    }

    /// Returns the sorted object names in a bucket.
    pub fn names(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Total number of objects across buckets.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, bucket: &str, name: &str, data: &[u8], options: WriteOptions<'_>) -> bool {
        let key = (bucket.to_string(), name.to_string());
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        if !options.overwrite && objects.contains_key(&key) {
            return false;
        }
        objects.insert(
            key,
            StoredObject {
                data: data.to_vec(),
                content_type: options.content_type.to_string(),
                cache_control: options.cache_control.to_string(),
            },
        );
        true
    }
}

impl BlobStore for MemoryStore {
    fn exists<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move { Ok(self.get(bucket, name).is_some()) })
    }

    fn write<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
        data: &'a [u8],
        options: WriteOptions<'a>,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            crate::validate_bucket(bucket)?;
            crate::validate_name(name)?;
            Ok(self.put(bucket, name, data, options))
        })
    }

    fn read<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, StorageError>> {
        Box::pin(async move { Ok(self.get(bucket, name).map(|o| o.data)) })
    }
}
