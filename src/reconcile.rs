use std::fmt;

use crate::state::{newest, FileRecord, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
/// The result of `reconciliation`.
pub enum SyncAction {
    /// the file and both records agree
    UpToDate,
    /// the file changed here since both stores last agreed on it
    Upload { hash: String, timestamp: Timestamp },
    /// the remote store holds a newer version from another machine
    Download { hash: String, timestamp: Option<Timestamp> },
    /// the content already agrees, only the recorded timestamps are missing or stale
    ReconcileTimestamps { hash: String, timestamp: Timestamp },
    /// nothing can be done safely without a human
    Conflict {
        reason: String,
        /// when set, the local record's hash should become this (keeping its timestamp)
        refresh_local_hash: Option<String>,
    },
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match *self {
            SyncAction::UpToDate => "up to date",
            SyncAction::Upload { .. } => "upload",
            SyncAction::Download { .. } => "download",
            SyncAction::ReconcileTimestamps { .. } => "reconcile timestamps",
            SyncAction::Conflict { .. } => "conflict",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SyncAction::Conflict { ref reason, .. } => write!(f, "conflict: {}", reason),
            ref other => write!(f, "{}", other.name()),
        }
    }
}

/// Determines what needs to happen to bring a file and both stores back in agreement.
///
/// The content hash is the only ground truth for whether something changed;
/// timestamps only break ties between two differing hashes, since clocks on
/// different machines can't be trusted to agree.
pub fn decide(
    current_hash: &str,
    local: Option<&FileRecord>,
    remote: Option<&FileRecord>,
    file_mtime: &Timestamp,
) -> SyncAction {
    let remote = match remote {
        Some(remote) => remote,
        None => {
            debug!("No remote record, publishing the local copy");
            return SyncAction::Upload {
                hash: current_hash.to_owned(),
                timestamp: *file_mtime,
            };
        }
    };

    let local_hash = local.map(|l| l.hash.as_str());
    let local_changed = local_hash != Some(current_hash);
    let stores_agree = local_hash == Some(remote.hash.as_str());
    debug!(
        "current {} local {:?} remote {} (local changed: {}, stores agree: {})",
        current_hash, local_hash, remote.hash, local_changed, stores_agree
    );

    if local.is_none() && current_hash == remote.hash {
        let timestamp = newest(vec![Some(file_mtime), remote.last_modified.as_ref()])
            .unwrap_or(*file_mtime);
        debug!("First sync of a file that already matches the remote");
        return SyncAction::ReconcileTimestamps {
            hash: current_hash.to_owned(),
            timestamp,
        };
    }

    if stores_agree && local_changed {
        return SyncAction::Upload {
            hash: current_hash.to_owned(),
            timestamp: *file_mtime,
        };
    }

    let local_modified = local.and_then(|l| l.last_modified);

    if !stores_agree && local_changed {
        let reason = format!(
            "changed locally and remotely since the last sync \
             (file {}, local record {} at {}, remote record {} at {})",
            current_hash,
            local_hash.unwrap_or("<none>"),
            describe_time(local_modified.as_ref()),
            remote.hash,
            describe_time(remote.last_modified.as_ref()),
        );
        // only an existing record is refreshed; a missing one stays missing
        return SyncAction::Conflict {
            reason,
            refresh_local_hash: local.map(|_| current_hash.to_owned()),
        };
    }

    if !stores_agree {
        // an absent local timestamp sorts before any present one
        let remote_is_newer = match remote.last_modified {
            None => true,
            Some(ref remote_time) => local_modified.map_or(true, |l| l <= *remote_time),
        };
        if remote_is_newer {
            return SyncAction::Download {
                hash: remote.hash.clone(),
                timestamp: remote.last_modified,
            };
        }

        let reason = format!(
            "unchanged local copy {} claims to be newer ({}) than the differing remote {} ({})",
            current_hash,
            describe_time(local_modified.as_ref()),
            remote.hash,
            describe_time(remote.last_modified.as_ref()),
        );
        return SyncAction::Conflict {
            reason,
            refresh_local_hash: None,
        };
    }

    SyncAction::UpToDate
}

fn describe_time(time: Option<&Timestamp>) -> String {
    time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "<never>".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::parse_timestamp;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    fn record(hash: &str, last_modified: Option<&str>) -> FileRecord {
        FileRecord::new("saves", "ER0000.sl2", hash, last_modified.map(ts))
    }

    fn mtime() -> Timestamp {
        ts("2024-03-01T12:00:00Z")
    }

    #[test]
    fn everything_agrees() {
        let local = record("X", Some("2024-01-01T00:00:00Z"));
        let remote = record("X", Some("2024-01-01T00:00:00Z"));
        assert_eq!(decide("X", Some(&local), Some(&remote), &mtime()), SyncAction::UpToDate);
    }

    #[test]
    fn everything_agrees_even_without_timestamps() {
        let local = record("X", None);
        let remote = record("X", None);
        assert_eq!(decide("X", Some(&local), Some(&remote), &mtime()), SyncAction::UpToDate);
    }

    #[test]
    fn fresh_machine_matching_remote() {
        let remote = record("X", Some("2024-01-01T00:00:00Z"));
        assert_eq!(
            decide("X", None, Some(&remote), &mtime()),
            SyncAction::ReconcileTimestamps { hash: "X".into(), timestamp: mtime() }
        );
    }

    #[test]
    fn fresh_machine_takes_the_newest_timestamp() {
        let remote = record("X", Some("2024-09-01T00:00:00Z"));
        assert_eq!(
            decide("X", None, Some(&remote), &mtime()),
            SyncAction::ReconcileTimestamps { hash: "X".into(), timestamp: ts("2024-09-01T00:00:00Z") }
        );
    }

    #[test]
    fn simple_upload() {
        let local = record("X", Some("2024-01-01T00:00:00Z"));
        let remote = record("X", Some("2024-01-01T00:00:00Z"));
        assert_eq!(
            decide("Y", Some(&local), Some(&remote), &mtime()),
            SyncAction::Upload { hash: "Y".into(), timestamp: mtime() }
        );
    }

    #[test]
    fn upload_ignores_timestamps() {
        // the remote clock being ahead doesn't matter once the stores agree
        let local = record("X", Some("2030-01-01T00:00:00Z"));
        let remote = record("X", Some("2030-01-01T00:00:00Z"));
        assert_eq!(
            decide("Y", Some(&local), Some(&remote), &mtime()),
            SyncAction::Upload { hash: "Y".into(), timestamp: mtime() }
        );
    }

    #[test]
    fn simple_download() {
        let local = record("X", Some("2024-01-01T00:00:00Z"));
        let remote = record("Y", Some("2024-06-01T00:00:00Z"));
        assert_eq!(
            decide("X", Some(&local), Some(&remote), &mtime()),
            SyncAction::Download { hash: "Y".into(), timestamp: Some(ts("2024-06-01T00:00:00Z")) }
        );
    }

    #[test]
    fn download_on_equal_timestamps() {
        let local = record("X", Some("2024-06-01T00:00:00Z"));
        let remote = record("Y", Some("2024-06-01T02:00:00+02:00"));
        assert_eq!(
            decide("X", Some(&local), Some(&remote), &mtime()),
            SyncAction::Download { hash: "Y".into(), timestamp: Some(ts("2024-06-01T00:00:00Z")) }
        );
    }

    #[test]
    fn download_when_remote_has_no_timestamp() {
        let local = record("X", Some("2024-06-01T00:00:00Z"));
        let remote = record("Y", None);
        assert_eq!(
            decide("X", Some(&local), Some(&remote), &mtime()),
            SyncAction::Download { hash: "Y".into(), timestamp: None }
        );
    }

    #[test]
    fn download_when_local_has_no_timestamp() {
        let local = record("X", None);
        let remote = record("Y", Some("2024-06-01T00:00:00Z"));
        match decide("X", Some(&local), Some(&remote), &mtime()) {
            SyncAction::Download { hash, .. } => assert_eq!(hash, "Y"),
            other => panic!("expected a download, got {:?}", other),
        }
    }

    #[test]
    fn three_way_disagreement_is_a_conflict() {
        let local = record("A", Some("2024-01-01T00:00:00Z"));
        let remote = record("B", Some("2024-06-01T00:00:00Z"));
        match decide("C", Some(&local), Some(&remote), &mtime()) {
            SyncAction::Conflict { reason, refresh_local_hash } => {
                assert_eq!(refresh_local_hash, Some("C".to_owned()));
                assert!(reason.contains("A") && reason.contains("B") && reason.contains("C"));
                assert!(reason.contains("2024-01-01") && reason.contains("2024-06-01"));
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn fresh_machine_with_a_different_file_is_a_conflict() {
        let remote = record("B", Some("2024-06-01T00:00:00Z"));
        match decide("C", None, Some(&remote), &mtime()) {
            SyncAction::Conflict { refresh_local_hash, .. } => assert_eq!(refresh_local_hash, None),
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn fresh_machine_conflict_is_reported_again() {
        let remote = record("B", Some("2024-06-01T00:00:00Z"));
        for _ in 0..2 {
            match decide("C", None, Some(&remote), &mtime()) {
                SyncAction::Conflict { .. } => {}
                other => panic!("expected a conflict, got {:?}", other),
            }
        }
    }

    #[test]
    fn unchanged_but_newer_than_a_differing_remote_is_a_conflict() {
        let local = record("X", Some("2024-06-01T00:00:00Z"));
        let remote = record("Y", Some("2024-01-01T00:00:00Z"));
        match decide("X", Some(&local), Some(&remote), &mtime()) {
            SyncAction::Conflict { refresh_local_hash, .. } => assert_eq!(refresh_local_hash, None),
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn no_remote_record_uploads() {
        assert_eq!(
            decide("X", None, None, &mtime()),
            SyncAction::Upload { hash: "X".into(), timestamp: mtime() }
        );
        let local = record("X", Some("2024-01-01T00:00:00Z"));
        assert_eq!(
            decide("X", Some(&local), None, &mtime()),
            SyncAction::Upload { hash: "X".into(), timestamp: mtime() }
        );
    }

    #[test]
    fn acknowledged_conflict_becomes_a_download() {
        let local = record("A", Some("2024-01-01T00:00:00Z"));
        let remote = record("B", Some("2024-06-01T00:00:00Z"));
        let refreshed = match decide("C", Some(&local), Some(&remote), &mtime()) {
            SyncAction::Conflict { refresh_local_hash: Some(hash), .. } => {
                FileRecord { hash, ..local.clone() }
            }
            other => panic!("expected a conflict, got {:?}", other),
        };
        assert_eq!(
            decide("C", Some(&refreshed), Some(&remote), &mtime()),
            SyncAction::Download { hash: "B".into(), timestamp: Some(ts("2024-06-01T00:00:00Z")) }
        );
    }
}
