use anyhow::Result;
use clap::{Parser, Subcommand};
use evalhub::config::AppConfig;
use evalhub::jobs::{JobError, JobsClient, PollSettings};
use evalhub::telemetry;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "jobctl", about = "Inspect and wait on evaluation jobs")]
struct Cli {
    /// Path to config file; built-in defaults are used when omitted
    #[arg(long, short)]
    config: Option<String>,

    /// Jobs API base URL, overriding the config file
    #[arg(long)]
    api_url: Option<String>,

    /// Job-execution dashboard base URL, overriding the config file
    #[arg(long)]
    ray_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all jobs
    List,
    /// Show one job
    Get { id: String },
    /// Show the result of a finished job
    Result { id: String },
    /// Print the download URL of a job's result
    Download { id: String },
    /// Poll until the job succeeds, fails or stops
    Wait {
        id: String,
        /// Maximum number of status checks
        #[arg(long)]
        retries: Option<u32>,
        /// Seconds between status checks
        #[arg(long)]
        poll_wait: Option<u64>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON output.
    telemetry::init_telemetry_with_writer(std::io::stderr).map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.validate()?;

    let client = JobsClient::new(
        cli.api_url.as_deref().unwrap_or(&config.jobs.api_url),
        cli.ray_url.as_deref().unwrap_or(&config.jobs.ray_dashboard_url),
    )?;

    let outcome = run(&client, &config, cli.command).await;
    telemetry::shutdown_telemetry();
    outcome
}

async fn run(client: &JobsClient, config: &AppConfig, command: Command) -> Result<()> {
    match command {
        Command::List => print_json(&client.get_jobs().await?),
        Command::Get { id } => print_json(&client.get_job(&id).await?),
        Command::Result { id } => print_json(&client.get_job_result(&id).await?),
        Command::Download { id } => {
            let download = client.get_job_download(&id).await?;
            println!("{}", download.download_url);
            Ok(())
        }
        Command::Wait {
            id,
            retries,
            poll_wait,
        } => {
            let defaults = config.poll_settings();
            let settings = PollSettings {
                max_attempts: retries.unwrap_or(defaults.max_attempts),
                poll_interval: poll_wait
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.poll_interval),
            };

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, cancelling wait");
                    on_ctrl_c.cancel();
                }
            });

            match client.wait_for_job(&id, &settings, &cancel).await {
                Ok(snapshot) => print_json(&snapshot.payload),
                Err(e @ JobError::Cancelled { .. }) => {
                    tracing::warn!(job_id = %id, "Wait cancelled");
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}
