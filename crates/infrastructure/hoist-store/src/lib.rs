pub mod client;
pub mod transfer;

// Re-exports for convenience
pub use client::{HttpObjectStore, ObjectStore, StoreError};
pub use transfer::{BatchUploader, UploadEvent, UploadRequest, UploadResult};
