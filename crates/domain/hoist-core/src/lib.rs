use serde::{Deserialize, Serialize};

pub mod decide;
pub mod key;

/// One file that has to be transferred: where it lives locally and the
/// object key it maps to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadAction {
    pub local_path: String,
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    /// The destination key is already present in the bucket listing.
    AlreadyStored,
    /// The destination key does not sort after the high-water mark.
    NotAfterWatermark,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedUpload {
    pub local_path: String,
    pub key: String,
    pub size: u64,
    pub reason: SkipReason,
}

/// Outcome of applying the upload decision to every candidate file.
///
/// `keys_ascending` records whether candidate keys arrived in ascending
/// order; watermark decisions are only trustworthy when they did.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub uploads: Vec<UploadAction>,
    pub skips: Vec<SkippedUpload>,
    pub keys_ascending: bool,
}

impl UploadPlan {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }

    pub fn bytes_to_upload(&self) -> u64 {
        self.uploads.iter().map(|a| a.size).sum()
    }
}
