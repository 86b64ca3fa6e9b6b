use hoist_core::decide::RemoteIndex;
use hoist_store::ObjectStore;
use std::sync::Arc;

use crate::upload::{ListingMode, UploadError};

#[async_trait::async_trait]
pub trait RemoteIndexProvider: Send + Sync {
    /// Snapshot the remote side of the upload decision for one attempt.
    /// Each attempt takes a fresh snapshot; nothing is cached in between.
    async fn remote_index(
        &self,
        prefix: &str,
        mode: ListingMode,
    ) -> Result<RemoteIndex, UploadError>;
}

/// Store-backed provider. Full listings become a key set; incremental
/// listings keep only the last key the service returned.
pub struct StoreIndexProvider {
    store: Arc<dyn ObjectStore>,
}

impl StoreIndexProvider {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl RemoteIndexProvider for StoreIndexProvider {
    async fn remote_index(
        &self,
        prefix: &str,
        mode: ListingMode,
    ) -> Result<RemoteIndex, UploadError> {
        match mode {
            ListingMode::Full => {
                let keys = self
                    .store
                    .list_keys(prefix)
                    .await
                    .map_err(|e| UploadError::Remote(e.to_string()))?;
                Ok(RemoteIndex::Full(keys.into_iter().collect()))
            }
            ListingMode::Incremental => {
                let mark = self
                    .store
                    .last_key(prefix)
                    .await
                    .map_err(|e| UploadError::Remote(e.to_string()))?;
                Ok(RemoteIndex::Watermark(mark))
            }
        }
    }
}
