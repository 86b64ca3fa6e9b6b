use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use hoist_cli::{commands, resolve};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload new files from a local folder into the bucket
    Upload {
        #[arg(long, help = "Local folder to upload (prompted when omitted)")]
        in_folder: Option<Utf8PathBuf>,
        #[arg(long, help = "Destination folder inside the bucket (prompted when omitted)")]
        out_folder: Option<String>,
        #[arg(long, default_value = hoist_config::DEFAULT_PATTERN)]
        pattern: String,
        #[arg(long, env = hoist_config::ENV_BUCKET)]
        bucket: Option<String>,
        #[arg(long, default_value_t = hoist_config::DEFAULT_PARALLELISM)]
        parallelism: usize,
        #[arg(long, help = "Skip keys up to the last one already stored")]
        incremental: bool,
        #[arg(long, help = "Upload rate cap in MB/s")]
        limit_rate: Option<u64>,
        #[arg(long, default_value_t = hoist_config::DEFAULT_RETRY_BUDGET)]
        retries: u32,
        #[arg(long, default_value_t = hoist_config::DEFAULT_RETRY_DELAY_SECS)]
        retry_delay: u64,
        #[arg(long, default_value_t = hoist_config::DEFAULT_RETRY_RESET_SECS)]
        retry_reset: u64,
    },
    /// Dry run: show what would be uploaded, without transferring
    Check {
        #[arg(long, help = "Local folder to inspect (prompted when omitted)")]
        in_folder: Option<Utf8PathBuf>,
        #[arg(long, help = "Destination folder inside the bucket (prompted when omitted)")]
        out_folder: Option<String>,
        #[arg(long, default_value = hoist_config::DEFAULT_PATTERN)]
        pattern: String,
        #[arg(long, env = hoist_config::ENV_BUCKET)]
        bucket: Option<String>,
        #[arg(long)]
        incremental: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    match cli.command {
        Commands::Upload {
            in_folder,
            out_folder,
            pattern,
            bucket,
            parallelism,
            incremental,
            limit_rate,
            retries,
            retry_delay,
            retry_reset,
        } => {
            let job = resolve::resolve_job(resolve::JobArgs {
                in_folder,
                out_folder,
                pattern,
                bucket,
                parallelism,
                incremental,
                limit_rate,
                retries,
                retry_delay,
                retry_reset,
            })?;

            match commands::cmd_upload(&job).await? {
                commands::RunStatus::Finished(_) => println!("Finished uploading."),
                commands::RunStatus::Interrupted => {
                    println!("You stopped the program.");
                    std::process::exit(130);
                }
            }
        }
        Commands::Check {
            in_folder,
            out_folder,
            pattern,
            bucket,
            incremental,
        } => {
            let job = resolve::resolve_job(resolve::JobArgs {
                in_folder,
                out_folder,
                pattern,
                bucket,
                parallelism: hoist_config::DEFAULT_PARALLELISM,
                incremental,
                limit_rate: None,
                retries: hoist_config::DEFAULT_RETRY_BUDGET,
                retry_delay: hoist_config::DEFAULT_RETRY_DELAY_SECS,
                retry_reset: hoist_config::DEFAULT_RETRY_RESET_SECS,
            })?;
            commands::cmd_check(&job).await?;
        }
    }

    Ok(())
}
