use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use copy_assets::payload::{Payload, ProcessDefinition};
use copy_assets::selection::SelectionOptions;
use copy_assets::task::{self, TASK_NAME};
use copy_assets::transfer::{Destination, S3Transfer, DEFAULT_CONCURRENCY};
use copy_assets::validate::CoreValidator;

/// Copies selected assets of a STAC item payload to s3 and rewrites the item
/// to point at the new locations.
#[derive(Parser)]
#[command(name = "copy-assets", version)]
struct Cli {
    /// Input payload json
    #[arg(long)]
    payload: PathBuf,

    /// Where to write the resulting payload
    #[arg(long)]
    output: PathBuf,

    /// Destination bucket for copied assets
    #[arg(long)]
    bucket: String,

    /// Key prefix under the destination bucket
    #[arg(long, default_value = "")]
    prefix: String,

    /// Toml file overriding the task options embedded in the payload
    #[arg(long)]
    options: Option<PathBuf>,

    /// Aws profile for the destination client; ambient credentials when unset
    #[arg(long)]
    profile: Option<String>,

    /// Concurrent asset transfers
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut payload = Payload::read(&cli.payload)?;
    if let Some(path) = &cli.options {
        let options = SelectionOptions::read(path)?;
        if payload.process.is_empty() {
            payload.process.push(ProcessDefinition::default());
        }
        payload.process[0]
            .tasks
            .insert(TASK_NAME.to_string(), serde_json::to_value(&options)?);
    }

    let destination = Destination {
        bucket: cli.bucket,
        prefix: cli.prefix,
    };
    let transfer = match &cli.profile {
        Some(profile) => S3Transfer::from_profile(profile, destination).await,
        None => S3Transfer::from_env(destination).await,
    }
    .with_concurrency(cli.concurrency);

    let payload = task::run(payload, &transfer, &CoreValidator).await?;
    payload.write(&cli.output)?;

    Ok(())
}
