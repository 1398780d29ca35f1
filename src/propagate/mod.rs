use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::SyncInfo;
use crate::error::{DescribeIoError, SyncError};
use crate::fingerprint::fingerprint_file;
use crate::reconcile::{decide, SyncAction};
use crate::scan::{eligible_files, eligible_objects, LocalFile};
use crate::state::{timestamp_from_system_time, FileRecord, Timestamp};
use crate::store::MetadataStore;
use crate::transfer::{ObjectInfo, ObjectTransport};
use crate::util::{FnvHashMap, FnvHashSet};

mod progress;
mod report;
pub use crate::propagate::progress::{EmptyProgressCallback, ProgressCallback};
pub use crate::propagate::report::{Outcome, ReportEntry, SyncReport};

/// Drives reconciliation for the files of one sync root, one file at a time.
///
/// The stores and the transport are handed in, so tests can swap any of them for fakes.
pub struct Syncer<L, R, T> {
    pub config: SyncInfo,
    local: L,
    remote: R,
    transport: T,
}

impl<L, R, T> Syncer<L, R, T>
where
    L: MetadataStore,
    R: MetadataStore,
    T: ObjectTransport,
{
    pub fn new(config: SyncInfo, local: L, remote: R, transport: T) -> Self {
        Syncer {
            config,
            local,
            remote,
            transport,
        }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reconciles one file and carries out whatever that requires.
    ///
    /// Errors never escape: they are folded into the returned entry.
    pub fn sync_file(&self, file: &LocalFile) -> ReportEntry {
        let outcome = self.reconcile_file(file).unwrap_or_else(|e| {
            error!("Syncing {} failed: {}", file.key, e);
            Outcome::Failed(e)
        });
        ReportEntry::new(&file.key, outcome)
    }

    /// `sync_file` for a path, using its file name as the key.
    pub fn sync_path(&self, path: &Path) -> ReportEntry {
        match path.file_name().and_then(|name| name.to_str()) {
            Some(key) => self.sync_file(&LocalFile {
                key: key.to_owned(),
                path: path.to_path_buf(),
            }),
            None => {
                let e = SyncError::InvalidConfig(format!("{:?} has no usable file name", path));
                error!("Not syncing {:?}: {}", path, e);
                ReportEntry::new(&path.to_string_lossy(), Outcome::Failed(e))
            }
        }
    }

    /// Syncs every eligible local file, then fetches every eligible object only the remote has.
    pub fn sync_directory<P>(&self, progress: &P) -> Result<SyncReport, SyncError>
    where
        P: ProgressCallback,
    {
        let files = eligible_files(&self.config.root, &self.config.eligible)?;
        let listing = self.transport.list_objects(&self.config.bucket)?;
        let objects = eligible_objects(listing, &self.config.eligible);

        let local_keys: FnvHashSet<&str> = files.iter().map(|f| f.key.as_str()).collect();
        let remote_only: Vec<&ObjectInfo> = objects
            .iter()
            .filter(|object| !local_keys.contains(object.key.as_str()))
            .collect();
        let total = files.len() + remote_only.len();
        info!(
            "Syncing {:?} with {}: {} local file(s), {} remote-only object(s)",
            self.config.root,
            self.config.bucket,
            files.len(),
            remote_only.len()
        );

        let mut report = SyncReport::new();
        for (i, file) in files.iter().enumerate() {
            progress.reconciling(&file.key, i, total);
            let entry = self.sync_file(file);
            progress.finished(&entry);
            report.push(entry);
        }

        for (i, object) in remote_only.into_iter().enumerate() {
            progress.reconciling(&object.key, files.len() + i, total);
            let path = self.config.root.join(&object.key);
            let outcome = self.fetch(object, &path).unwrap_or_else(|e| {
                error!("Fetching {} failed: {}", object.key, e);
                Outcome::Failed(e)
            });
            let entry = ReportEntry::new(&object.key, outcome);
            progress.finished(&entry);
            report.push(entry);
        }

        log_report(&report);
        Ok(report)
    }

    /// Uploads every eligible local file without reconciling, overwriting the remote copy.
    pub fn upload_all<P>(&self, progress: &P) -> Result<SyncReport, SyncError>
    where
        P: ProgressCallback,
    {
        let files = eligible_files(&self.config.root, &self.config.eligible)?;
        info!("Force uploading {} file(s) to {}", files.len(), self.config.bucket);

        let mut report = SyncReport::new();
        for (i, file) in files.iter().enumerate() {
            progress.reconciling(&file.key, i, files.len());
            let outcome = self.force_upload(file).unwrap_or_else(|e| {
                error!("Uploading {} failed: {}", file.key, e);
                Outcome::Failed(e)
            });
            let entry = ReportEntry::new(&file.key, outcome);
            progress.finished(&entry);
            report.push(entry);
        }

        info!("Uploaded {} file(s) to {} on {}", report.synced().count(), self.config.bucket, now());
        log_report(&report);
        Ok(report)
    }

    /// Downloads every eligible remote object without reconciling, overwriting local copies.
    pub fn download_all<P>(&self, progress: &P) -> Result<SyncReport, SyncError>
    where
        P: ProgressCallback,
    {
        let files = eligible_files(&self.config.root, &self.config.eligible)?;
        let local_paths: FnvHashMap<String, PathBuf> =
            files.into_iter().map(|f| (f.key, f.path)).collect();
        let listing = self.transport.list_objects(&self.config.bucket)?;
        let objects = eligible_objects(listing, &self.config.eligible);
        info!("Force downloading {} object(s) from {}", objects.len(), self.config.bucket);

        let mut report = SyncReport::new();
        for (i, object) in objects.iter().enumerate() {
            progress.reconciling(&object.key, i, objects.len());
            let path = local_paths
                .get(&object.key)
                .cloned()
                .unwrap_or_else(|| self.config.root.join(&object.key));
            let outcome = self.fetch(object, &path).unwrap_or_else(|e| {
                error!("Downloading {} failed: {}", object.key, e);
                Outcome::Failed(e)
            });
            let entry = ReportEntry::new(&object.key, outcome);
            progress.finished(&entry);
            report.push(entry);
        }

        info!("Downloaded {} file(s) from {} on {}", report.synced().count(), self.config.bucket, now());
        log_report(&report);
        Ok(report)
    }

    fn reconcile_file(&self, file: &LocalFile) -> Result<Outcome, SyncError> {
        let bucket = &self.config.bucket;
        let current_hash = fingerprint_file(&file.path)?;
        let mtime = modified_time(&file.path)?;
        let local = self.local.get(bucket, &file.key)?;
        let remote = self.remote.get(bucket, &file.key)?;

        let action = decide(&current_hash, local.as_ref(), remote.as_ref(), &mtime);
        info!("{}: {}", file.key, action);
        self.apply(file, action, local.as_ref(), remote.as_ref())
    }

    fn apply(
        &self,
        file: &LocalFile,
        action: SyncAction,
        local: Option<&FileRecord>,
        remote: Option<&FileRecord>,
    ) -> Result<Outcome, SyncError> {
        let bucket = &self.config.bucket;
        let key = &file.key;

        match action {
            SyncAction::UpToDate => Ok(Outcome::Synced(SyncAction::UpToDate)),
            SyncAction::Upload { ref hash, ref timestamp } => {
                self.transport.upload(&file.path, bucket, key)?;
                let writes = vec![
                    ("local store", self.local.put(bucket, key, hash, Some(timestamp))),
                    ("remote store", self.remote.put(bucket, key, hash, Some(timestamp))),
                ];
                Ok(bookkeeping(key, action.clone(), writes))
            }
            SyncAction::Download { ref hash, timestamp } => {
                self.transport.download(bucket, key, &file.path)?;
                Ok(self.record_download(key, &file.path, Some(hash.as_str()), timestamp, None))
            }
            SyncAction::ReconcileTimestamps { ref hash, ref timestamp } => {
                let stale = |record: Option<&FileRecord>| {
                    record.map_or(true, |r| r.last_modified.as_ref() != Some(timestamp))
                };
                if stale(local) {
                    debug!("Recording {} at {} locally", key, timestamp);
                    self.local.put(bucket, key, hash, Some(timestamp))?;
                }
                if stale(remote) {
                    debug!("Recording {} at {} remotely", key, timestamp);
                    self.remote.put(bucket, key, hash, Some(timestamp))?;
                }
                Ok(Outcome::Synced(action.clone()))
            }
            SyncAction::Conflict { reason, refresh_local_hash } => {
                warn!("Conflict on {}: {}", key, reason);
                if let (Some(hash), Some(local)) = (refresh_local_hash, local) {
                    // the conflict is still reported if this fails, just again next time
                    if let Err(e) = self.local.put(bucket, key, &hash, local.last_modified.as_ref()) {
                        error!("Couldn't record the local change to {}: {}", key, e);
                    }
                }
                Ok(Outcome::Conflict { reason })
            }
        }
    }

    fn force_upload(&self, file: &LocalFile) -> Result<Outcome, SyncError> {
        let bucket = &self.config.bucket;
        let hash = fingerprint_file(&file.path)?;
        let timestamp = modified_time(&file.path)?;

        self.transport.upload(&file.path, bucket, &file.key)?;
        let writes = vec![
            ("local store", self.local.put(bucket, &file.key, &hash, Some(&timestamp))),
            ("remote store", self.remote.put(bucket, &file.key, &hash, Some(&timestamp))),
        ];
        Ok(bookkeeping(&file.key, SyncAction::Upload { hash, timestamp }, writes))
    }

    /// Downloads `object` to `path`, copying the remote record when there is one.
    fn fetch(&self, object: &ObjectInfo, path: &Path) -> Result<Outcome, SyncError> {
        let bucket = &self.config.bucket;
        let remote = self.remote.get(bucket, &object.key)?;
        self.transport.download(bucket, &object.key, path)?;

        let (hash, timestamp) = match remote {
            Some(record) => (Some(record.hash), record.last_modified),
            None => (None, None),
        };
        Ok(self.record_download(&object.key, path, hash.as_deref(), timestamp, object.last_modified))
    }

    /// Persists a completed download.
    ///
    /// `hash` and `timestamp` come from the remote record. Without a remote
    /// timestamp the listed one (or else the file's mtime) is used, and the
    /// remote record is refreshed with it too.
    fn record_download(
        &self,
        key: &str,
        path: &Path,
        hash: Option<&str>,
        timestamp: Option<Timestamp>,
        listed: Option<Timestamp>,
    ) -> Outcome {
        let bucket = &self.config.bucket;
        let downloaded = fingerprint_file(path);

        let hash = match (hash, downloaded) {
            (Some(expected), Ok(ref actual)) => {
                if expected != actual.as_str() {
                    warn!("{} downloaded with hash {}, but the remote record says {}", key, actual, expected);
                }
                expected.to_owned()
            }
            (Some(expected), Err(e)) => {
                warn!("Couldn't verify the download of {}: {}", key, e);
                expected.to_owned()
            }
            (None, Ok(actual)) => actual,
            (None, Err(e)) => {
                let action = SyncAction::Download { hash: String::new(), timestamp };
                return bookkeeping(key, action, vec![("hashing the download", Err(e))]);
            }
        };

        let resolved = timestamp
            .or(listed)
            .or_else(|| modified_time(path).ok());
        let mut writes = vec![("local store", self.local.put(bucket, key, &hash, resolved.as_ref()))];
        if timestamp.is_none() {
            writes.push(("remote store", self.remote.put(bucket, key, &hash, resolved.as_ref())));
        }
        bookkeeping(key, SyncAction::Download { hash, timestamp: resolved }, writes)
    }
}

/// Turns the store writes that follow a completed transfer into an outcome.
fn bookkeeping(key: &str, action: SyncAction, writes: Vec<(&str, Result<(), SyncError>)>) -> Outcome {
    let failures: Vec<String> = writes
        .into_iter()
        .filter_map(|(what, result)| result.err().map(|e| format!("{}: {}", what, e)))
        .collect();

    if failures.is_empty() {
        Outcome::Synced(action)
    } else {
        let error = failures.join("; ");
        error!("{} was transferred but not fully recorded: {}", key, error);
        Outcome::PartialSuccess { action, error }
    }
}

fn modified_time(path: &Path) -> Result<Timestamp, SyncError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .describe(|| format!("reading the modification time of {:?}", path))?;
    Ok(timestamp_from_system_time(modified))
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn log_report(report: &SyncReport) {
    if report.success() {
        info!("Sync finished: {} file(s) in sync", report.entries.len());
    } else {
        for entry in report.failures() {
            warn!("{}: {}", entry.filename, entry.message());
        }
        info!(
            "Sync finished with {} problem(s) out of {} file(s)",
            report.failures().count(),
            report.entries.len()
        );
    }
}
