//! Drive a travel-plan generation from the terminal.

mod config;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use planner_stream::prelude::*;
use planner_stream::{ConsumerOptions, consume_with_options, init_observability};

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "Generate a travel plan and follow its progress")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a new plan version for a project and stream its progress
    Generate {
        /// Project to generate the plan for
        #[arg(short, long)]
        project: String,
        /// Name of the new plan version (must be unique in the project)
        #[arg(short, long)]
        name: String,
        /// Free-form instructions for the generator
        #[arg(long)]
        prompt: Option<String>,
        /// Trip start date (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Trip end date (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Output language for the plan
        #[arg(long)]
        language: Option<String>,
        /// API base URL (defaults to PLANNER_API_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
        /// Cancel the generation if it has not finished after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Substring that marks the terminal plan line
        #[arg(long)]
        marker: Option<String>,
    },
    /// Feed a recorded stream from a file through the consumer
    Replay {
        /// File containing the raw response body
        file: PathBuf,
        /// Bytes per simulated network chunk
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,
        /// Substring that marks the terminal plan line
        #[arg(long)]
        marker: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    config::init();
    init_observability();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            project,
            name,
            prompt,
            start,
            end,
            language,
            base_url,
            timeout_secs,
            marker,
        } => {
            let mut request = GeneratePlanRequest::new(name);
            if let Some(prompt) = prompt {
                request = request.prompt(prompt);
            }
            if let (Some(start), Some(end)) = (start, end) {
                request = request.dates(start, end);
            }
            if let Some(language) = language {
                request = request.language(language);
            }

            let client_config = config::client_config(base_url.as_deref())?;
            let transport = HttpPlanTransport::new(client_config)?;
            let mut builder = PlanGenerator::builder(Arc::new(transport))
                .consumer_options(consumer_options(marker));
            if let Some(secs) = timeout_secs {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            generate(builder.build(), project, request).await
        }
        Commands::Replay {
            file,
            chunk_size,
            marker,
        } => replay(file, chunk_size, consumer_options(marker)).await,
    }
}

fn consumer_options(marker: Option<String>) -> ConsumerOptions {
    match marker {
        Some(marker) => ConsumerOptions::default().terminal_marker(marker),
        None => ConsumerOptions::default(),
    }
}

async fn generate(
    planner: PlanGenerator,
    project: String,
    request: GeneratePlanRequest,
) -> Result<ExitCode> {
    let mut run = planner.start(project, request).await?;
    info!(run_id = %run.run_id(), project = run.project_id(), "generation started");

    let abort = run.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    while let Some(event) = run.next_event().await {
        match event {
            GenerationEvent::Progress {
                percent, message, ..
            } => render::progress(percent, message.as_deref()),
            GenerationEvent::Finished { .. } => break,
            GenerationEvent::Started { .. } => {}
        }
    }

    let result = run.finish().await.map(|report| report.outcome);
    render::status(&GenerationStatus::from_result(&result))
}

async fn replay(file: PathBuf, chunk_size: usize, options: ConsumerOptions) -> Result<ExitCode> {
    anyhow::ensure!(chunk_size > 0, "--chunk-size must be greater than 0");
    let raw = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = raw
        .chunks(chunk_size)
        .map(|chunk| Ok(bytes::Bytes::copy_from_slice(chunk)))
        .collect();

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut state = StreamState::new();
    let mut sink = |percent: u8, message: Option<&str>| render::progress(percent, message);
    let result = consume_with_options(
        Some(futures::stream::iter(chunks)),
        &mut state,
        &mut sink,
        &cancel,
        &options,
    )
    .await
    .map_err(GenerateError::from);
    render::status(&GenerationStatus::from_result(&result))
}
