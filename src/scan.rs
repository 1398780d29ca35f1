use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Eligibility;
use crate::error::SyncError;
use crate::transfer::ObjectInfo;

/// An eligible file found under the sync root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// The object key, which is the file name.
    pub key: String,
    pub path: PathBuf,
}

/// Finds every eligible regular file below `root`, ordered by key.
///
/// Keys are bare file names, so when two sub-directories hold files with the
/// same name only the first one met by a name-sorted walk is used.
pub fn eligible_files(root: &Path, eligible: &Eligibility) -> Result<Vec<LocalFile>, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::RootDoesntExist(root.to_path_buf()));
    }

    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = match entry {
            Ok(entry) => entry,
            // the root itself must be readable, anything below it is skipped
            Err(ref e) if e.depth() > 0 => {
                warn!("Skipping part of {:?}: {}", root, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let key = match entry.file_name().to_str() {
            Some(name) => name.to_owned(),
            None => {
                warn!("Skipping {:?}: file name isn't valid unicode", entry.path());
                continue;
            }
        };
        if !eligible.is_eligible(&key) {
            trace!("Ignoring {:?}", entry.path());
            continue;
        }

        if let Some(existing) = found.get(&key) {
            warn!("Skipping {:?}: {:?} already uses the key {:?}", entry.path(), existing, key);
            continue;
        }
        debug!("Found eligible file {:?}", entry.path());
        found.insert(key, entry.into_path());
    }

    Ok(found.into_iter().map(|(key, path)| LocalFile { key, path }).collect())
}

/// Keeps the eligible objects of a listing, ordered by key.
pub fn eligible_objects<I>(listing: I, eligible: &Eligibility) -> Vec<ObjectInfo>
where
    I: IntoIterator<Item = ObjectInfo>,
{
    let mut objects: Vec<ObjectInfo> = listing
        .into_iter()
        .filter(|object| eligible.is_eligible(&object.key))
        .collect();
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    objects
}
