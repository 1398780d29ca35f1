use std::fmt;

use crate::error::SyncError;
use crate::reconcile::SyncAction;

/// How handling a single file ended.
#[derive(Debug)]
pub enum Outcome {
    /// The action, and all bookkeeping for it, completed.
    Synced(SyncAction),
    /// The transfer happened but at least one store could not record it.
    PartialSuccess { action: SyncAction, error: String },
    /// Nothing was transferred; a human has to decide.
    Conflict { reason: String },
    /// The file couldn't be handled at all.
    Failed(SyncError),
}

#[derive(Debug)]
pub struct ReportEntry {
    pub filename: String,
    pub outcome: Outcome,
}

impl ReportEntry {
    pub fn new(filename: &str, outcome: Outcome) -> Self {
        ReportEntry {
            filename: filename.to_owned(),
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        match self.outcome {
            Outcome::Synced(_) => true,
            _ => false,
        }
    }

    /// The action that was carried out, fully or partially.
    pub fn action(&self) -> Option<&SyncAction> {
        match self.outcome {
            Outcome::Synced(ref action) | Outcome::PartialSuccess { ref action, .. } => Some(action),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Synced(ref action) => done(action).to_owned(),
            Outcome::PartialSuccess { ref action, ref error } => {
                format!("{}, but the sync records are inconsistent: {}", done(action), error)
            }
            Outcome::Conflict { ref reason } => format!("conflict, fix manually: {}", reason),
            Outcome::Failed(ref e) => format!("failed: {}", e),
        }
    }
}

fn done(action: &SyncAction) -> &'static str {
    match *action {
        SyncAction::UpToDate => "up to date",
        SyncAction::Upload { .. } => "uploaded",
        SyncAction::Download { .. } => "downloaded",
        SyncAction::ReconcileTimestamps { .. } => "timestamps reconciled",
        SyncAction::Conflict { .. } => "conflict",
    }
}

/// Per-file outcomes in the order the files were handled.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<ReportEntry>,
}

impl SyncReport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// True only if every file fully succeeded; conflicts and partial successes count as failures.
    pub fn success(&self) -> bool {
        self.entries.iter().all(ReportEntry::success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.success())
    }

    /// Entries whose file was transferred, fully recorded or not.
    pub fn synced(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.action().is_some())
    }

    pub fn get(&self, filename: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// `(filename, success, message)` for every file.
    pub fn rows(&self) -> Vec<(String, bool, String)> {
        self.entries
            .iter()
            .map(|e| (e.filename.clone(), e.success(), e.message()))
            .collect()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let failed = self.failures().count();
        if failed == 0 {
            writeln!(f, "Synced {} file(s)", self.entries.len())?;
        } else {
            writeln!(f, "Sync failed for {} of {} file(s)", failed, self.entries.len())?;
        }
        for entry in &self.entries {
            writeln!(f, "{}: {}", entry.filename, entry.message())?;
        }
        Ok(())
    }
}
