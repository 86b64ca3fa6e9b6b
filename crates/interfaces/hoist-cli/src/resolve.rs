use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use hoist_pipeline::retry::RetryPolicy;
use hoist_pipeline::upload::ListingMode;
use std::io::Write;
use std::time::Duration;

/// Everything one upload run needs, fully settled. Prompting and
/// environment lookups happen here; the pipeline below never blocks on
/// stdin or reads a variable.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub source_root: Utf8PathBuf,
    pub destination_prefix: String,
    pub pattern: String,
    pub bucket: String,
    pub endpoint: String,
    pub token: Option<String>,
    pub mode: ListingMode,
    pub parallelism: usize,
    pub rate_limit_bytes: Option<u64>,
    pub retry: RetryPolicy,
    pub known_total: Option<u64>,
}

/// Raw command-line inputs, before prompting and validation.
pub struct JobArgs {
    pub in_folder: Option<Utf8PathBuf>,
    pub out_folder: Option<String>,
    pub pattern: String,
    pub bucket: Option<String>,
    pub parallelism: usize,
    pub incremental: bool,
    pub limit_rate: Option<u64>,
    pub retries: u32,
    pub retry_delay: u64,
    pub retry_reset: u64,
}

pub fn resolve_job(args: JobArgs) -> Result<UploadJob> {
    let source_root = match args.in_folder {
        Some(path) => path,
        None => Utf8PathBuf::from(prompt("Which folder do you want to upload?")?),
    };
    if !source_root.is_dir() {
        bail!("source folder '{source_root}' is not a directory");
    }

    let destination_prefix = match args.out_folder {
        Some(prefix) => prefix,
        None => prompt("Which bucket folder should receive the files?")?,
    };

    let Some(bucket) = args.bucket else {
        bail!(
            "no bucket configured: pass --bucket or set {}",
            hoist_config::ENV_BUCKET
        );
    };

    Ok(UploadJob {
        source_root,
        destination_prefix,
        pattern: args.pattern,
        bucket,
        endpoint: endpoint(),
        token: env_var(hoist_config::ENV_TOKEN),
        mode: if args.incremental {
            ListingMode::Incremental
        } else {
            ListingMode::Full
        },
        parallelism: hoist_config::clamp_parallelism(args.parallelism),
        rate_limit_bytes: args.limit_rate.map(|mb| mb * 1024 * 1024),
        retry: RetryPolicy {
            budget: args.retries,
            backoff: Duration::from_secs(args.retry_delay),
            reset_after: Duration::from_secs(args.retry_reset),
        },
        known_total: known_total(),
    })
}

fn prompt(question: &str) -> Result<String> {
    print!("{question} ");
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let answer = line.trim();
    if answer.is_empty() {
        bail!("no value entered");
    }
    Ok(answer.to_string())
}

fn endpoint() -> String {
    env_var(hoist_config::ENV_ENDPOINT).unwrap_or_else(|| hoist_config::DEFAULT_ENDPOINT.to_string())
}

fn known_total() -> Option<u64> {
    env_var(hoist_config::ENV_KNOWN_TOTAL).and_then(|v| v.parse().ok())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_args(root: &Utf8PathBuf) -> JobArgs {
        JobArgs {
            in_folder: Some(root.clone()),
            out_folder: Some("dest".to_string()),
            pattern: "**/*".to_string(),
            bucket: Some("my-bucket".to_string()),
            parallelism: 4,
            incremental: false,
            limit_rate: None,
            retries: 5,
            retry_delay: 5,
            retry_reset: 200,
        }
    }

    fn tmp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn fully_specified_args_never_prompt() {
        let (_dir, root) = tmp_root();
        let job = resolve_job(full_args(&root)).unwrap();

        assert_eq!(job.source_root, root);
        assert_eq!(job.destination_prefix, "dest");
        assert_eq!(job.bucket, "my-bucket");
        assert_eq!(job.mode, ListingMode::Full);
        assert_eq!(job.retry.budget, 5);
        assert_eq!(job.retry.backoff, Duration::from_secs(5));
    }

    #[test]
    fn missing_source_directory_fails_fast() {
        let (_dir, root) = tmp_root();
        let mut args = full_args(&root);
        args.in_folder = Some(root.join("does-not-exist"));

        let err = resolve_job(args).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn missing_bucket_is_an_error() {
        let (_dir, root) = tmp_root();
        let mut args = full_args(&root);
        args.bucket = None;

        let err = resolve_job(args).unwrap_err();
        assert!(err.to_string().contains("BUCKET"));
    }

    #[test]
    fn parallelism_is_clamped() {
        let (_dir, root) = tmp_root();
        let mut args = full_args(&root);
        args.parallelism = 1000;
        assert_eq!(resolve_job(args).unwrap().parallelism, 16);

        let mut args = full_args(&root);
        args.parallelism = 0;
        assert_eq!(resolve_job(args).unwrap().parallelism, 1);
    }

    #[test]
    fn incremental_flag_selects_watermark_mode() {
        let (_dir, root) = tmp_root();
        let mut args = full_args(&root);
        args.incremental = true;
        assert_eq!(resolve_job(args).unwrap().mode, ListingMode::Incremental);
    }

    #[test]
    fn rate_limit_converts_to_bytes() {
        let (_dir, root) = tmp_root();
        let mut args = full_args(&root);
        args.limit_rate = Some(2);
        assert_eq!(resolve_job(args).unwrap().rate_limit_bytes, Some(2 * 1024 * 1024));
    }
}
