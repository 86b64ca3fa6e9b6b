use crate::{SkipReason, SkippedUpload, UploadAction, UploadPlan};
use std::collections::HashSet;

/// Snapshot of remote state taken at listing time, shared read-only by
/// every upload decision within one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteIndex {
    /// Every object key currently stored under the destination prefix.
    Full(HashSet<String>),
    /// Only the last key observed while listing, used as a cutoff.
    ///
    /// Correct only when the store lists keys in ascending order and the
    /// destination keys themselves sort in upload order. That is a
    /// precondition of the caller, not something this type enforces.
    Watermark(Option<String>),
}

impl RemoteIndex {
    /// The one real decision in the system, kept pure: does this
    /// destination key have to be uploaded?
    pub fn needs_upload(&self, key: &str) -> bool {
        match self {
            RemoteIndex::Full(existing) => !existing.contains(key),
            RemoteIndex::Watermark(None) => true,
            RemoteIndex::Watermark(Some(mark)) => key > mark.as_str(),
        }
    }

    fn skip_reason(&self) -> SkipReason {
        match self {
            RemoteIndex::Full(_) => SkipReason::AlreadyStored,
            RemoteIndex::Watermark(_) => SkipReason::NotAfterWatermark,
        }
    }
}

/// Partition candidate uploads into pending transfers and skips.
///
/// Candidates are consumed in enumeration order; the resulting plan also
/// records whether their keys arrived ascending, since watermark mode is
/// only sound when they did.
pub fn build_plan(candidates: Vec<UploadAction>, index: &RemoteIndex) -> UploadPlan {
    let mut uploads = Vec::new();
    let mut skips = Vec::new();
    let mut keys_ascending = true;
    let mut previous_key: Option<String> = None;

    for candidate in candidates {
        if let Some(prev) = &previous_key {
            if candidate.key.as_str() < prev.as_str() {
                keys_ascending = false;
            }
        }
        previous_key = Some(candidate.key.clone());

        if index.needs_upload(&candidate.key) {
            uploads.push(candidate);
        } else {
            skips.push(SkippedUpload {
                local_path: candidate.local_path,
                key: candidate.key,
                size: candidate.size,
                reason: index.skip_reason(),
            });
        }
    }

    UploadPlan {
        uploads,
        skips,
        keys_ascending,
    }
}
