use crate::propagate::report::ReportEntry;

/// Handles progress updates while a batch of files is synced.
pub trait ProgressCallback {
    /// Called before the `index`th of `total` files is handled.
    fn reconciling(&self, filename: &str, index: usize, total: usize);

    /// Called with the outcome of each file as soon as it is known.
    fn finished(&self, entry: &ReportEntry);
}

/// A zero-sized struct with an empty implementation of ProgressCallback
pub struct EmptyProgressCallback;

impl ProgressCallback for EmptyProgressCallback {
    fn reconciling(&self, _: &str, _: usize, _: usize) {}

    fn finished(&self, _: &ReportEntry) {}
}
