use camino::Utf8PathBuf;
use hoist_core::UploadPlan;
use hoist_store::{BatchUploader, ObjectStore, UploadEvent, UploadRequest as TransferRequest};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

use crate::upload::{UploadError, UploadOptions, UploadStats};

#[async_trait::async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute(
        &self,
        plan: &UploadPlan,
        opts: &UploadOptions,
        progress_tx: Option<Sender<UploadEvent>>,
    ) -> Result<UploadStats, UploadError>;
}

/// Executor that feeds the plan's pending uploads through the store's
/// bounded batch uploader. One failed item fails the whole attempt; the
/// job runner owns the retry, never this layer.
pub struct BatchPlanExecutor {
    store: Arc<dyn ObjectStore>,
}

impl BatchPlanExecutor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl PlanExecutor for BatchPlanExecutor {
    async fn execute(
        &self,
        plan: &UploadPlan,
        opts: &UploadOptions,
        progress_tx: Option<Sender<UploadEvent>>,
    ) -> Result<UploadStats, UploadError> {
        let mut stats = UploadStats::default();
        let mut requests = Vec::new();

        for (i, action) in plan.uploads.iter().enumerate() {
            requests.push(TransferRequest {
                id: i as u64,
                source: Utf8PathBuf::from(action.local_path.clone()),
                key: action.key.clone(),
                expected_size: action.size,
            });
            stats.files_planned_upload += 1;
            stats.bytes_planned_upload += action.size;
        }
        stats.files_skipped = plan.skips.len() as u64;

        let uploader = BatchUploader::new(self.store.clone(), opts.parallelism);
        let results = uploader.upload_batch(requests, progress_tx).await;

        let mut failed = 0u64;
        let mut last_error: Option<String> = None;
        for res in results {
            if res.success {
                stats.files_uploaded += 1;
                stats.bytes_uploaded += res.bytes_uploaded;
            } else {
                failed += 1;
                if let Some(detail) = res.error {
                    last_error = Some(detail);
                }
            }
        }

        if failed > 0 {
            let detail = last_error.unwrap_or_else(|| "no error detail".to_string());
            return Err(UploadError::Transfer(format!(
                "Failed uploads: {failed} ({detail})"
            )));
        }

        Ok(stats)
    }
}
