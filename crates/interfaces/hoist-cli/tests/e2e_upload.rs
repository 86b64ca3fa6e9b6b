use axum::body::{Body, Bytes};
use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use camino::Utf8PathBuf;
use hoist_cli::commands::{self, RunStatus};
use hoist_cli::resolve::UploadJob;
use hoist_pipeline::retry::RetryPolicy;
use hoist_pipeline::upload::{ListingMode, UploadOutcome};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

type Objects = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

async fn start_bucket(objects: Objects) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let list_objects = objects.clone();
    let upload_objects = objects.clone();

    let app = Router::new()
        .route(
            "/storage/v1/b/e2e-bucket/o",
            get(move || {
                let objects = list_objects.clone();
                async move {
                    let items: Vec<serde_json::Value> = objects
                        .lock()
                        .unwrap()
                        .keys()
                        .map(|k| serde_json::json!({ "name": k }))
                        .collect();
                    Body::from(serde_json::json!({ "items": items }).to_string()).into_response()
                }
            }),
        )
        .route(
            "/upload/storage/v1/b/e2e-bucket/o",
            post(
                move |Query(params): Query<HashMap<String, String>>, body: Bytes| {
                    let objects = upload_objects.clone();
                    async move {
                        let name = params.get("name").cloned().unwrap_or_default();
                        objects.lock().unwrap().insert(name, body.to_vec());
                        Body::from("{}").into_response()
                    }
                },
            ),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

fn job_for(addr: SocketAddr, root: &Utf8PathBuf, incremental: bool) -> UploadJob {
    UploadJob {
        source_root: root.clone(),
        destination_prefix: "dest".to_string(),
        pattern: "**/*".to_string(),
        bucket: "e2e-bucket".to_string(),
        endpoint: format!("http://{addr}"),
        token: None,
        mode: if incremental {
            ListingMode::Incremental
        } else {
            ListingMode::Full
        },
        parallelism: 2,
        rate_limit_bytes: None,
        retry: RetryPolicy {
            budget: 2,
            backoff: Duration::ZERO,
            reset_after: Duration::from_secs(3600),
        },
        known_total: None,
    }
}

fn finished(status: RunStatus) -> UploadOutcome {
    match status {
        RunStatus::Finished(outcome) => outcome,
        RunStatus::Interrupted => panic!("upload was interrupted"),
    }
}

fn write_file(root: &Utf8PathBuf, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn full_upload_lifecycle() {
    let objects: Objects = Arc::default();
    let (addr, server) = start_bucket(objects.clone()).await;

    let dir = tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    write_file(&root, "a.txt", b"alpha");
    write_file(&root, "sub/b.txt", b"bravo");

    // Phase 1: fresh upload moves every file.
    let job = job_for(addr, &root, false);
    let outcome = finished(commands::cmd_upload(&job).await.expect("Phase 1 upload failed"));
    assert!(outcome.executed);
    assert_eq!(outcome.stats.files_uploaded, 2);
    {
        let stored = objects.lock().unwrap();
        assert_eq!(stored.get("dest/a.txt").unwrap(), b"alpha");
        assert_eq!(stored.get("dest/sub/b.txt").unwrap(), b"bravo");
    }

    // Phase 2: a check right after reports a clean state.
    let plan = commands::cmd_check(&job).await.expect("Phase 2 check failed");
    assert!(plan.uploads.is_empty(), "nothing new should be pending");
    assert_eq!(plan.skips.len(), 2);

    // Phase 3: one new file appears; only it is transferred.
    write_file(&root, "c.txt", b"charlie");
    let outcome = finished(commands::cmd_upload(&job).await.expect("Phase 3 upload failed"));
    assert_eq!(outcome.stats.files_uploaded, 1);
    assert_eq!(outcome.stats.files_skipped, 2);
    assert_eq!(objects.lock().unwrap().len(), 3);

    server.abort();
}

#[tokio::test]
async fn incremental_job_only_sends_keys_after_the_last_stored() {
    let objects: Objects = Arc::default();
    objects
        .lock()
        .unwrap()
        .insert("dest/0005.log".to_string(), b"already there".to_vec());
    let (addr, server) = start_bucket(objects.clone()).await;

    let dir = tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    write_file(&root, "0003.log", b"old");
    write_file(&root, "0006.log", b"new");

    let job = job_for(addr, &root, true);
    let outcome = finished(commands::cmd_upload(&job).await.expect("incremental upload failed"));

    assert_eq!(outcome.stats.files_uploaded, 1);
    let stored = objects.lock().unwrap();
    assert!(stored.contains_key("dest/0006.log"));
    assert!(!stored.contains_key("dest/0003.log"));

    server.abort();
}
