use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DescribeIoError, SyncError};
use crate::state::{timestamp_from_system_time, Timestamp};

/// An object as reported by a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: Option<Timestamp>,
}

/// Moves file bytes to and from the object store.
pub trait ObjectTransport {
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> Result<(), SyncError>;

    /// Must leave `local_path` untouched if the transfer fails.
    fn download(&self, container: &str, key: &str, local_path: &Path) -> Result<(), SyncError>;

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, SyncError>;
}

impl<'a, T: ObjectTransport + ?Sized> ObjectTransport for &'a T {
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> Result<(), SyncError> {
        (**self).upload(local_path, container, key)
    }

    fn download(&self, container: &str, key: &str, local_path: &Path) -> Result<(), SyncError> {
        (**self).download(container, key, local_path)
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, SyncError> {
        (**self).list_objects(container)
    }
}

/// An object store laid out on a filesystem: one directory per container under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    pub root: PathBuf,
}

impl DirectoryTransport {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectoryTransport { root: root.into() }
    }

    pub fn object_path(&self, container: &str, key: &str) -> PathBuf {
        self.root.join(container).join(key)
    }
}

impl ObjectTransport for DirectoryTransport {
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> Result<(), SyncError> {
        let dest = self.object_path(container, key);
        info!("Uploading {:?} to {}/{}", local_path, container, key);
        transfer_file(local_path, &dest)
    }

    fn download(&self, container: &str, key: &str, local_path: &Path) -> Result<(), SyncError> {
        let source = self.object_path(container, key);
        if !source.is_file() {
            return Err(SyncError::ObjectNotFound {
                container: container.to_owned(),
                key: key.to_owned(),
            });
        }
        info!("Downloading {}/{} to {:?}", container, key, local_path);
        transfer_file(&source, local_path)
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, SyncError> {
        let directory = self.root.join(container);
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Container {:?} doesn't exist yet, nothing to list", directory);
                return Ok(Vec::new());
            }
            Err(e) => return Err(SyncError::DescribedIoError {
                context: format!("listing container {:?}", directory),
                source: e,
            }),
        };

        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry.describe(|| format!("listing container {:?}", directory))?;
            let metadata = entry.metadata().describe(|| format!("reading metadata of {:?}", entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            let key = match entry.file_name().into_string() {
                Ok(key) => key,
                Err(name) => {
                    warn!("Skipping object {:?}: key isn't valid unicode", name);
                    continue;
                }
            };
            if key.ends_with(".part") {
                continue;
            }
            let last_modified = metadata.modified().ok().map(timestamp_from_system_time);
            trace!("Listed object {} ({:?})", key, last_modified);
            objects.push(ObjectInfo { key, last_modified });
        }
        Ok(objects)
    }
}

/// Copies through a `.part` sibling so `dest` is only ever replaced by a complete file.
fn transfer_file(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        if !parent.exists() {
            info!("Creating parent directory {:?}", parent);
            fs::create_dir_all(parent).describe(|| format!("creating directory {:?}", parent))?;
        }
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let copied = fs::copy(source, &partial)
        .and_then(|_| fs::rename(&partial, dest))
        .describe(|| format!("while copying file from {:?} to {:?}", source, dest));
    if copied.is_err() {
        let _ = fs::remove_file(&partial);
    }
    copied
}
