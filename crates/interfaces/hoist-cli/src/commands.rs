use crate::resolve::UploadJob;
use anyhow::{Context, Result};
use hoist_core::UploadPlan;
use hoist_pipeline::retry::run_with_retry;
use hoist_pipeline::tracker::ProgressTracker;
use hoist_pipeline::upload::{
    default_engine, UploadEngine, UploadError, UploadOptions, UploadOutcome, UploadRequest,
};
use hoist_store::{HttpObjectStore, ObjectStore};
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Terminal outcome of `upload`, kept apart from errors so the binary
/// can map each to its own exit path.
pub enum RunStatus {
    Finished(UploadOutcome),
    Interrupted,
}

fn build_engine(job: &UploadJob) -> Result<Arc<UploadEngine>> {
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
        client,
        job.endpoint.clone(),
        job.bucket.clone(),
        job.token.clone(),
        job.rate_limit_bytes,
    ));
    Ok(Arc::new(default_engine(store)))
}

fn upload_request(job: &UploadJob) -> UploadRequest {
    UploadRequest {
        source_root: job.source_root.clone(),
        destination_prefix: job.destination_prefix.clone(),
        pattern: job.pattern.clone(),
        mode: job.mode,
        options: UploadOptions {
            parallelism: job.parallelism,
        },
    }
}

pub async fn cmd_upload(job: &UploadJob) -> Result<RunStatus> {
    println!(":: Uploading...");
    println!("   Source: {}", job.source_root);
    println!("   Target: {}/{}", job.bucket, job.destination_prefix);

    let engine = build_engine(job)?;
    let req = upload_request(job);

    // Provisional length until the first plan lands with exact totals.
    let pb = ProgressBar::new(job.known_total.unwrap_or(0));
    let sty = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} ETA {eta} {msg}",
    )
    .unwrap()
    .progress_chars("=>-");
    pb.set_style(sty);
    pb.set_message("Planning...");

    let retried = run_with_retry(&job.retry, || {
        let engine = engine.clone();
        let req = req.clone();
        let pb = pb.clone();
        async move { run_attempt(engine, req, pb).await }
    });
    tokio::pin!(retried);

    let outcome = tokio::select! {
        res = &mut retried => res,
        _ = tokio::signal::ctrl_c() => {
            pb.abandon_with_message("Interrupted");
            return Ok(RunStatus::Interrupted);
        }
    };

    match outcome {
        Ok(outcome) => {
            pb.finish_with_message("Upload complete");
            println!("\n:: Upload Result");
            println!("   Scanned:  {}", outcome.stats.files_scanned);
            println!(
                "   Uploaded: {} ({})",
                outcome.stats.files_uploaded,
                format_size(outcome.stats.bytes_uploaded, DECIMAL)
            );
            println!("   Skipped:  {}", outcome.stats.files_skipped);
            Ok(RunStatus::Finished(outcome))
        }
        Err(e) => {
            pb.abandon_with_message("Upload failed");
            Err(e.into())
        }
    }
}

/// One whole-pipeline attempt: fresh enumeration, fresh listing, fresh
/// plan, then execution with live progress.
async fn run_attempt(
    engine: Arc<UploadEngine>,
    req: UploadRequest,
    pb: ProgressBar,
) -> Result<UploadOutcome, UploadError> {
    let plan = engine.plan(&req).await?;

    pb.set_position(0);
    pb.set_length(plan.bytes_to_upload());
    pb.set_message(format!("Uploading {} files", plan.uploads.len()));

    let mut tracker = ProgressTracker::new(&plan);
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let exec_engine = engine.clone();
    let exec_req = req.clone();
    let handle =
        tokio::spawn(async move { exec_engine.execute_with_plan(&exec_req, plan, Some(tx)).await });

    while let Some(ev) = rx.recv().await {
        tracker.update(ev);
        let snap = tracker.get_snapshot();
        pb.set_position(snap.uploaded_bytes);
        pb.set_message(format!(
            "{}/{} files at {}/s",
            snap.uploaded_files,
            snap.total_files,
            format_size(snap.speed_bps, DECIMAL)
        ));
    }

    handle
        .await
        .map_err(|e| UploadError::Transfer(format!("upload task failed: {e}")))?
}

pub async fn cmd_check(job: &UploadJob) -> Result<UploadPlan> {
    println!(":: Analyzing state...");
    println!("   Source: {}", job.source_root);
    println!("   Target: {}/{}", job.bucket, job.destination_prefix);

    let engine = build_engine(job)?;
    let req = upload_request(job);
    let plan = engine.plan(&req).await?;

    println!("\n:: Analysis Result");
    println!(
        "   Pending Uploads: {} ({})",
        plan.uploads.len(),
        format_size(plan.bytes_to_upload(), DECIMAL)
    );
    println!("   Already Stored:  {}", plan.skips.len());

    if plan.uploads.is_empty() {
        println!("   Status:          Up to date");
    } else {
        println!("   Status:          Uploads pending (run `upload`)");
    }

    Ok(plan)
}
