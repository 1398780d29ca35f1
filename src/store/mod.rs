//! The two metadata stores the reconciliation depends on.
//!
//! Both hold one `FileRecord` per `(bucket, filename)`: the local store
//! remembers what this machine last synced, the remote store what every
//! machine last agreed on.

pub mod local;
pub mod remote;
pub mod retry;

use crate::error::SyncError;
use crate::state::{FileRecord, Timestamp};

pub use self::local::LocalStore;
pub use self::remote::{MemoryBackend, RemoteBackend, RemoteItem, RemoteStore};
pub use self::retry::RetryPolicy;

/// Lookup and upsert of file records.
pub trait MetadataStore {
    /// `Ok(None)` means the file has never been synced, not an error.
    fn get(&self, bucket: &str, filename: &str) -> Result<Option<FileRecord>, SyncError>;

    /// Inserts the record, or updates it in place if the key already exists.
    fn put(
        &self,
        bucket: &str,
        filename: &str,
        hash: &str,
        last_modified: Option<&Timestamp>,
    ) -> Result<(), SyncError>;
}

impl<'a, S: MetadataStore + ?Sized> MetadataStore for &'a S {
    fn get(&self, bucket: &str, filename: &str) -> Result<Option<FileRecord>, SyncError> {
        (**self).get(bucket, filename)
    }

    fn put(
        &self,
        bucket: &str,
        filename: &str,
        hash: &str,
        last_modified: Option<&Timestamp>,
    ) -> Result<(), SyncError> {
        (**self).put(bucket, filename, hash, last_modified)
    }
}
