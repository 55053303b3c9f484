//! Change detection against the last synced fingerprint

use pubsync_common::types::{FileFingerprint, SyncBaseline};

/// True when the remote file differs from the baseline in size or mtime
pub fn has_changed(current: &FileFingerprint, baseline: &SyncBaseline) -> bool {
    current.size != baseline.size || current.modified_at != baseline.modified_at
}

/// Owns the baseline of the last successful sync.
///
/// The baseline only moves through [`ChangeDetector::advance`], which the
/// pipeline calls after both downstream calls succeed.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    baseline: SyncBaseline,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self) -> SyncBaseline {
        self.baseline
    }

    pub fn has_changed(&self, current: &FileFingerprint) -> bool {
        has_changed(current, &self.baseline)
    }

    pub fn advance(&mut self, current: FileFingerprint) {
        self.baseline = current.into();
    }
}
