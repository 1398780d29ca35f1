use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, SyncError};
use crate::state::{format_timestamp, parse_optional_timestamp, FileRecord, Timestamp};
use crate::store::retry::RetryPolicy;
use crate::store::MetadataStore;
use crate::util::FnvHashMap;

/// An item of the shared remote table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// `"{bucket}_{filename}"`
    pub key: String,
    pub filename: String,
    pub bucket: String,
    pub hash: String,
    pub lastmodified: Option<String>,
}

impl RemoteItem {
    pub fn key_for(bucket: &str, filename: &str) -> String {
        format!("{}_{}", bucket, filename)
    }

    pub fn new(bucket: &str, filename: &str, hash: &str, last_modified: Option<&Timestamp>) -> Self {
        RemoteItem {
            key: RemoteItem::key_for(bucket, filename),
            filename: filename.to_owned(),
            bucket: bucket.to_owned(),
            hash: hash.to_owned(),
            lastmodified: last_modified.map(format_timestamp),
        }
    }

    /// Interprets the item, failing with `Malformed` when its timestamp can't be read.
    pub fn into_record(self) -> Result<FileRecord, RemoteError> {
        let last_modified = parse_optional_timestamp(self.lastmodified.as_deref())
            .map_err(|e| RemoteError::Malformed(format!("item {:?}: {}", self.key, e)))?;
        Ok(FileRecord {
            bucket: self.bucket,
            filename: self.filename,
            hash: self.hash,
            last_modified,
        })
    }
}

/// A single round trip to the remote table; retries are layered on by `RemoteStore`.
pub trait RemoteBackend {
    /// `Ok(None)` for a genuine "not found" response.
    fn get_item(&self, key: &str) -> Result<Option<RemoteItem>, RemoteError>;

    fn put_item(&self, item: &RemoteItem) -> Result<(), RemoteError>;
}

impl<'a, B: RemoteBackend + ?Sized> RemoteBackend for &'a B {
    fn get_item(&self, key: &str) -> Result<Option<RemoteItem>, RemoteError> {
        (**self).get_item(key)
    }

    fn put_item(&self, item: &RemoteItem) -> Result<(), RemoteError> {
        (**self).put_item(item)
    }
}

/// The metadata every machine last agreed on, reached through a `RemoteBackend`.
pub struct RemoteStore<B> {
    backend: B,
    retry: RetryPolicy,
}

impl<B: RemoteBackend> RemoteStore<B> {
    pub fn new(backend: B, retry: RetryPolicy) -> Self {
        RemoteStore { backend, retry }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: RemoteBackend> MetadataStore for RemoteStore<B> {
    fn get(&self, bucket: &str, filename: &str) -> Result<Option<FileRecord>, SyncError> {
        let key = RemoteItem::key_for(bucket, filename);
        let what = format!("remote get {:?}", key);
        let item = self.retry.run_transient(&what, || self.backend.get_item(&key))?;

        match item {
            Some(item) => {
                if item.bucket != bucket || item.filename != filename {
                    return Err(RemoteError::Malformed(format!(
                        "item {:?} describes {}/{}",
                        key, item.bucket, item.filename
                    ))
                    .into());
                }
                let record = item.into_record()?;
                trace!("Remote record for {}: {} {:?}", key, record.hash, record.last_modified);
                Ok(Some(record))
            }
            None => {
                trace!("No remote record for {}", key);
                Ok(None)
            }
        }
    }

    fn put(
        &self,
        bucket: &str,
        filename: &str,
        hash: &str,
        last_modified: Option<&Timestamp>,
    ) -> Result<(), SyncError> {
        let item = RemoteItem::new(bucket, filename, hash, last_modified);
        let what = format!("remote put {:?}", item.key);
        self.retry.run_transient(&what, || self.backend.put_item(&item))?;
        debug!("Stored remote record {} = {} {:?}", item.key, hash, item.lastmodified);
        Ok(())
    }
}

/// A remote table held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RefCell<FnvHashMap<String, RemoteItem>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores an item as-is, bypassing every check.
    pub fn insert_raw(&self, item: RemoteItem) {
        self.items.borrow_mut().insert(item.key.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl RemoteBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<RemoteItem>, RemoteError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn put_item(&self, item: &RemoteItem) -> Result<(), RemoteError> {
        self.insert_raw(item.clone());
        Ok(())
    }
}
