pub mod retry;
pub mod tracker;
pub mod upload;

// Re-export core engine components
pub use retry::{run_with_retry, JobError, RetryPolicy, Retryable};
pub use tracker::{ProgressTracker, TransferSnapshot};
pub use upload::{
    default_engine, ListingMode, UploadEngine, UploadError, UploadOptions, UploadOutcome,
    UploadRequest, UploadStats,
};
