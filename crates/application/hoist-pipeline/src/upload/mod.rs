use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

pub mod engine;
pub mod execute;
pub mod local;
pub mod remote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMode {
    /// Materialize every existing key under the prefix for exact
    /// membership tests.
    Full,
    /// Keep only the last listed key; upload strictly-greater keys.
    /// Assumes destination keys sort in upload order.
    Incremental,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub parallelism: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source_root: Utf8PathBuf,
    pub destination_prefix: String,
    pub pattern: String,
    pub mode: ListingMode,
    pub options: UploadOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadStats {
    pub files_scanned: u64,
    pub files_planned_upload: u64,
    pub bytes_planned_upload: u64,
    pub files_uploaded: u64,
    pub bytes_uploaded: u64,
    pub files_skipped: u64,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub plan: hoist_core::UploadPlan,
    pub executed: bool,
    pub stats: UploadStats,
}

/// High-level error type for upload operations.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Local enumeration error: {0}")]
    Local(String),
    #[error("Remote listing error: {0}")]
    Remote(String),
    #[error("Transfer error: {0}")]
    Transfer(String),
}

impl crate::retry::Retryable for UploadError {
    /// Bad configuration fails fast; everything else is transient enough
    /// to warrant a whole-job restart.
    fn is_retryable(&self) -> bool {
        !matches!(self, UploadError::InvalidInput(_))
    }
}

pub use engine::UploadEngine;
pub use local::{GlobFileProvider, LocalFile, LocalFileProvider};

/// Convenience constructor for the default engine.
pub fn default_engine(store: std::sync::Arc<dyn hoist_store::ObjectStore>) -> UploadEngine {
    UploadEngine::new(store)
}
