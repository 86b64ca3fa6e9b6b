use crate::client::ObjectStore;
use camino::Utf8PathBuf;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub id: u64,
    pub source: Utf8PathBuf,
    pub key: String,
    pub expected_size: u64,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub id: u64,
    pub success: bool,
    pub bytes_uploaded: u64,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum UploadEvent {
    Started { id: u64, total_bytes: u64 },
    Progress { id: u64, bytes_delta: u64 },
    Completed { id: u64, success: bool },
}

/// Drives a set of uploads through a bounded worker pool.
pub struct BatchUploader {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl BatchUploader {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Generic batch transfer. Does NOT decide what to upload and does NOT
    /// retry failures; both are the caller's concern.
    pub async fn upload_batch(
        &self,
        items: Vec<UploadRequest>,
        progress_tx: Option<Sender<UploadEvent>>,
    ) -> Vec<UploadResult> {
        stream::iter(items)
            .map(|item| {
                let store = self.store.clone();
                let tx = progress_tx.clone();

                async move { Self::upload_single(store, item, tx).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn upload_single(
        store: Arc<dyn ObjectStore>,
        req: UploadRequest,
        tx: Option<Sender<UploadEvent>>,
    ) -> UploadResult {
        if let Some(ref t) = tx {
            let _ = t
                .send(UploadEvent::Started {
                    id: req.id,
                    total_bytes: req.expected_size,
                })
                .await;
        }

        match store.upload_file(&req.source, &req.key).await {
            Ok(bytes_uploaded) => {
                if let Some(ref t) = tx {
                    let _ = t
                        .send(UploadEvent::Progress {
                            id: req.id,
                            bytes_delta: bytes_uploaded,
                        })
                        .await;
                    let _ = t
                        .send(UploadEvent::Completed {
                            id: req.id,
                            success: true,
                        })
                        .await;
                }
                UploadResult {
                    id: req.id,
                    success: true,
                    bytes_uploaded,
                    error: None,
                }
            }
            Err(e) => {
                if let Some(ref t) = tx {
                    let _ = t
                        .send(UploadEvent::Completed {
                            id: req.id,
                            success: false,
                        })
                        .await;
                }
                UploadResult {
                    id: req.id,
                    success: false,
                    bytes_uploaded: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
