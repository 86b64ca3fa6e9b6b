use hoist_core::decide::{build_plan, RemoteIndex};
use hoist_core::key::destination_key;
use hoist_core::{UploadAction, UploadPlan};
use hoist_store::{ObjectStore, UploadEvent};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

use crate::upload::execute::{BatchPlanExecutor, PlanExecutor};
use crate::upload::local::{GlobFileProvider, LocalFile, LocalFileProvider};
use crate::upload::remote::{RemoteIndexProvider, StoreIndexProvider};
use crate::upload::{ListingMode, UploadError, UploadOutcome, UploadRequest, UploadStats};

pub struct UploadEngine {
    local: Box<dyn LocalFileProvider>,
    remote: Box<dyn RemoteIndexProvider>,
    executor: Box<dyn PlanExecutor>,
}

impl UploadEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        let local = Box::new(GlobFileProvider);
        let remote = Box::new(StoreIndexProvider::new(store.clone()));
        let executor = Box::new(BatchPlanExecutor::new(store));
        Self {
            local,
            remote,
            executor,
        }
    }

    pub fn with_components(
        local: Box<dyn LocalFileProvider>,
        remote: Box<dyn RemoteIndexProvider>,
        executor: Box<dyn PlanExecutor>,
    ) -> Self {
        Self {
            local,
            remote,
            executor,
        }
    }

    /// Step 1: Disk only. Enumerate candidate files under the source root.
    /// A source root that is not a directory fails here, before any
    /// network traffic.
    pub async fn enumerate_local(
        &self,
        req: &UploadRequest,
    ) -> Result<Vec<LocalFile>, UploadError> {
        if !req.source_root.is_dir() {
            return Err(UploadError::InvalidInput(format!(
                "source folder '{}' is not a directory",
                req.source_root
            )));
        }
        self.local.enumerate(&req.source_root, &req.pattern).await
    }

    /// Step 2: Network only. Take a fresh snapshot of the remote state
    /// under the destination prefix.
    pub async fn fetch_remote_index(
        &self,
        req: &UploadRequest,
    ) -> Result<RemoteIndex, UploadError> {
        self.remote
            .remote_index(&req.destination_prefix, req.mode)
            .await
    }

    /// Step 3: CPU only. Map every candidate to its destination key and
    /// split the batch into uploads and skips.
    pub fn compute_plan(
        &self,
        req: &UploadRequest,
        files: &[LocalFile],
        index: &RemoteIndex,
    ) -> Result<UploadPlan, UploadError> {
        let mut candidates = Vec::with_capacity(files.len());
        for file in files {
            let key = destination_key(
                req.source_root.as_str(),
                &req.destination_prefix,
                file.path.as_str(),
            )
            .map_err(|e| UploadError::InvalidInput(e.to_string()))?;
            candidates.push(UploadAction {
                local_path: file.path.to_string(),
                key,
                size: file.size,
            });
        }

        let plan = build_plan(candidates, index);
        if req.mode == ListingMode::Incremental && !plan.keys_ascending {
            tracing::warn!(
                "Destination keys under '{}' are not in ascending order; the incremental cutoff may skip files that were never uploaded",
                req.destination_prefix
            );
        }
        Ok(plan)
    }

    /// Pure planning step - enumerate, list, decide. No transfers.
    pub async fn plan(&self, req: &UploadRequest) -> Result<UploadPlan, UploadError> {
        let files = self.enumerate_local(req).await?;
        let index = self.fetch_remote_index(req).await?;
        self.compute_plan(req, &files, &index)
    }

    /// Plan + execute.
    pub async fn plan_and_execute(
        &self,
        req: &UploadRequest,
        progress_tx: Option<Sender<UploadEvent>>,
    ) -> Result<UploadOutcome, UploadError> {
        let files = self.enumerate_local(req).await?;
        let index = self.fetch_remote_index(req).await?;
        let plan = self.compute_plan(req, &files, &index)?;
        self.execute_with_plan(req, plan, progress_tx).await
    }

    /// Execute a plan computed earlier in the same attempt.
    pub async fn execute_with_plan(
        &self,
        req: &UploadRequest,
        plan: UploadPlan,
        progress_tx: Option<Sender<UploadEvent>>,
    ) -> Result<UploadOutcome, UploadError> {
        // Every candidate landed on exactly one side of the plan.
        let files_scanned = (plan.uploads.len() + plan.skips.len()) as u64;

        for skip in &plan.skips {
            tracing::debug!("Already uploaded: {}", skip.local_path);
        }

        if plan.is_empty() {
            let stats = UploadStats {
                files_scanned,
                files_skipped: plan.skips.len() as u64,
                ..UploadStats::default()
            };
            return Ok(UploadOutcome {
                plan,
                executed: false,
                stats,
            });
        }

        let mut stats = self
            .executor
            .execute(&plan, &req.options, progress_tx)
            .await?;
        stats.files_scanned = files_scanned;

        Ok(UploadOutcome {
            plan,
            executed: true,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadOptions;
    use camino::{Utf8Path, Utf8PathBuf};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLocal {
        files: Vec<LocalFile>,
    }

    #[async_trait::async_trait]
    impl LocalFileProvider for FakeLocal {
        async fn enumerate(
            &self,
            _root: &Utf8Path,
            _pattern: &str,
        ) -> Result<Vec<LocalFile>, UploadError> {
            Ok(self.files.clone())
        }
    }

    struct FakeRemote {
        index: RemoteIndex,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl RemoteIndexProvider for FakeRemote {
        async fn remote_index(
            &self,
            _prefix: &str,
            _mode: ListingMode,
        ) -> Result<RemoteIndex, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.index.clone())
        }
    }

    struct CountingExecutor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl PlanExecutor for CountingExecutor {
        async fn execute(
            &self,
            plan: &UploadPlan,
            _opts: &UploadOptions,
            _progress_tx: Option<Sender<UploadEvent>>,
        ) -> Result<UploadStats, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UploadStats {
                files_planned_upload: plan.uploads.len() as u64,
                files_uploaded: plan.uploads.len() as u64,
                bytes_uploaded: plan.bytes_to_upload(),
                files_skipped: plan.skips.len() as u64,
                ..UploadStats::default()
            })
        }
    }

    fn local_file(root: &Utf8Path, rel: &str, size: u64) -> LocalFile {
        LocalFile {
            path: root.join(rel),
            size,
        }
    }

    fn request(root: &Utf8Path, mode: ListingMode) -> UploadRequest {
        UploadRequest {
            source_root: root.to_owned(),
            destination_prefix: "dest".into(),
            pattern: "**/*".into(),
            mode,
            options: UploadOptions::default(),
        }
    }

    fn engine_with(
        files: Vec<LocalFile>,
        index: RemoteIndex,
        remote_calls: Arc<AtomicUsize>,
        executor_calls: Arc<AtomicUsize>,
    ) -> UploadEngine {
        UploadEngine::with_components(
            Box::new(FakeLocal { files }),
            Box::new(FakeRemote {
                index,
                calls: remote_calls,
            }),
            Box::new(CountingExecutor {
                calls: executor_calls,
            }),
        )
    }

    fn tmp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn plan_empty_when_everything_is_stored() {
        let (_dir, root) = tmp_root();
        let files = vec![local_file(&root, "a.txt", 5), local_file(&root, "b.txt", 7)];
        let index = RemoteIndex::Full(HashSet::from(["dest/a.txt".into(), "dest/b.txt".into()]));
        let engine = engine_with(files, index, Arc::default(), Arc::default());

        let plan = engine.plan(&request(&root, ListingMode::Full)).await.unwrap();
        assert!(plan.uploads.is_empty());
        assert_eq!(plan.skips.len(), 2);
    }

    #[tokio::test]
    async fn plan_uploads_only_what_is_missing() {
        let (_dir, root) = tmp_root();
        let files = vec![local_file(&root, "a.txt", 5), local_file(&root, "b.txt", 7)];
        let index = RemoteIndex::Full(HashSet::from(["dest/a.txt".into()]));
        let engine = engine_with(files, index, Arc::default(), Arc::default());

        let plan = engine.plan(&request(&root, ListingMode::Full)).await.unwrap();
        assert_eq!(plan.uploads.len(), 1);
        assert_eq!(plan.uploads[0].key, "dest/b.txt");
        assert_eq!(plan.skips.len(), 1);
        assert_eq!(plan.skips[0].key, "dest/a.txt");
    }

    #[tokio::test]
    async fn watermark_cuts_at_last_observed_key() {
        let (_dir, root) = tmp_root();
        let files = vec![
            local_file(&root, "0003.log", 3),
            local_file(&root, "0005.log", 5),
            local_file(&root, "0006.log", 6),
        ];
        let index = RemoteIndex::Watermark(Some("dest/0005.log".into()));
        let engine = engine_with(files, index, Arc::default(), Arc::default());

        let plan = engine
            .plan(&request(&root, ListingMode::Incremental))
            .await
            .unwrap();
        let keys: Vec<_> = plan.uploads.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["dest/0006.log"]);
        assert_eq!(plan.skips.len(), 2);
    }

    #[tokio::test]
    async fn empty_plan_never_reaches_the_executor() {
        let (_dir, root) = tmp_root();
        let files = vec![local_file(&root, "a.txt", 5)];
        let index = RemoteIndex::Full(HashSet::from(["dest/a.txt".into()]));
        let executor_calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(files, index, Arc::default(), executor_calls.clone());

        let outcome = engine
            .plan_and_execute(&request(&root, ListingMode::Full), None)
            .await
            .unwrap();
        assert!(!outcome.executed);
        assert_eq!(outcome.stats.files_scanned, 1);
        assert_eq!(outcome.stats.files_skipped, 1);
        assert_eq!(executor_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pending_plan_runs_the_executor_once() {
        let (_dir, root) = tmp_root();
        let files = vec![local_file(&root, "a.txt", 5), local_file(&root, "b.txt", 7)];
        let index = RemoteIndex::Full(HashSet::new());
        let executor_calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(files, index, Arc::default(), executor_calls.clone());

        let outcome = engine
            .plan_and_execute(&request(&root, ListingMode::Full), None)
            .await
            .unwrap();
        assert!(outcome.executed);
        assert_eq!(outcome.stats.files_scanned, 2);
        assert_eq!(outcome.stats.files_uploaded, 2);
        assert_eq!(outcome.stats.bytes_uploaded, 12);
        assert_eq!(executor_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_source_root_fails_before_any_listing() {
        let remote_calls = Arc::new(AtomicUsize::new(0));
        let engine = engine_with(
            Vec::new(),
            RemoteIndex::Full(HashSet::new()),
            remote_calls.clone(),
            Arc::default(),
        );

        let root = Utf8PathBuf::from("/definitely/not/a/directory");
        let err = engine
            .plan(&request(&root, ListingMode::Full))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
        assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn candidate_outside_root_is_invalid_input() {
        let (_dir, root) = tmp_root();
        let stray = LocalFile {
            path: Utf8PathBuf::from("/elsewhere/x.txt"),
            size: 1,
        };
        let engine = engine_with(
            vec![stray],
            RemoteIndex::Full(HashSet::new()),
            Arc::default(),
            Arc::default(),
        );

        let err = engine
            .plan(&request(&root, ListingMode::Full))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }
}
