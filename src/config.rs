use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{DescribeIoError, SyncError};
use crate::store::retry::RetryPolicy;

/// The configuration for the sync business.
#[derive(Debug)]
pub struct SyncInfo {
    /// Local directory holding the files to sync.
    pub root: PathBuf,
    /// Container id on the object store, also the bucket half of every record key.
    pub bucket: String,
    pub eligible: Eligibility,
    /// SQLite file backing the local metadata store.
    pub local_store: PathBuf,
    pub retry: RetryPolicy,
}

/// Determines which file names take part in a sync.
#[derive(Debug)]
pub struct Eligibility {
    /// Allowed suffixes; empty allows every name.
    pub extensions: Vec<String>,
    pub ignore: Vec<Regex>,
}

impl Eligibility {
    /// An `Eligibility` that lets everything through
    pub fn everything() -> Self {
        Eligibility {
            extensions: Vec::new(),
            ignore: Vec::new(),
        }
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Eligibility {
            extensions: extensions.into_iter().map(Into::into).collect(),
            ignore: Vec::new(),
        }
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        let allowed = self.extensions.is_empty()
            || self.extensions.iter().any(|ext| name.ends_with(ext.as_str()));
        allowed && !self.ignore.iter().any(|re| re.is_match(name))
    }
}

impl SyncInfo {
    pub fn new<P: Into<PathBuf>>(root: P, bucket: &str) -> Self {
        SyncInfo {
            root: root.into(),
            bucket: bucket.to_owned(),
            eligible: Eligibility::everything(),
            local_store: PathBuf::from("filesync.db"),
            retry: RetryPolicy::default(),
        }
    }

    /// Reads a `<local dir>,<bucket>` sync config file and a one-per-line extension whitelist.
    pub fn load(sync_config: &Path, extension_whitelist: &Path) -> Result<Self, SyncError> {
        let raw = fs::read_to_string(sync_config)
            .describe(|| format!("reading sync config {:?}", sync_config))?;
        let (root, bucket) = parse_sync_config(&raw)?;

        let raw = fs::read_to_string(extension_whitelist)
            .describe(|| format!("reading extension whitelist {:?}", extension_whitelist))?;
        let extensions = parse_whitelist(&raw)?;

        info!("Loaded config: syncing {:?} with bucket {:?} ({} extensions)", root, bucket, extensions.len());
        let mut info = SyncInfo::new(root, &bucket);
        info.eligible = Eligibility::with_extensions(extensions);
        Ok(info)
    }
}

fn parse_sync_config(raw: &str) -> Result<(PathBuf, String), SyncError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| SyncError::InvalidConfig("sync config is empty".to_owned()))?;

    let mut columns = line.splitn(2, ',').map(str::trim);
    let root = columns.next().unwrap_or_default();
    let bucket = columns.next().unwrap_or_default();
    if root.is_empty() || bucket.is_empty() {
        return Err(SyncError::InvalidConfig(format!(
            "expected \"<local dir>,<bucket>\", found {:?}",
            line
        )));
    }
    Ok((PathBuf::from(root), bucket.to_owned()))
}

fn parse_whitelist(raw: &str) -> Result<Vec<String>, SyncError> {
    let extensions: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    if extensions.is_empty() {
        return Err(SyncError::InvalidConfig("extension whitelist is empty".to_owned()));
    }
    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_takes_the_first_row() {
        let (root, bucket) = parse_sync_config("\n /saves/ER0000 , er-saves \nignored,row\n").unwrap();
        assert_eq!(root, PathBuf::from("/saves/ER0000"));
        assert_eq!(bucket, "er-saves");
    }

    #[test]
    fn sync_config_needs_both_columns() {
        assert!(parse_sync_config("/saves/only").is_err());
        assert!(parse_sync_config(",bucket").is_err());
        assert!(parse_sync_config("   \n").is_err());
    }

    #[test]
    fn whitelist_skips_blank_lines() {
        let exts = parse_whitelist(".sl2\n\n  .bak \n").unwrap();
        assert_eq!(exts, vec![".sl2".to_owned(), ".bak".to_owned()]);
        assert!(parse_whitelist("\n\n").is_err());
    }

    #[test]
    fn eligibility_checks_suffix_and_ignores() {
        let mut eligible = Eligibility::with_extensions(vec![".sl2"]);
        eligible.ignore.push(Regex::new(r"^~").unwrap());
        assert!(eligible.is_eligible("ER0000.sl2"));
        assert!(!eligible.is_eligible("ER0000.sl2.bak"));
        assert!(!eligible.is_eligible("~ER0000.sl2"));
        assert!(Eligibility::everything().is_eligible("anything"));
    }
}
