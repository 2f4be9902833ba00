use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use batch_lifecycle::api::HttpBatchClient;
use batch_lifecycle::clock::SystemClock;
use batch_lifecycle::config;
use batch_lifecycle::{BatchId, BatchManager, BatchPatch, BatchStatus, DeleteOutcome, DragOutcome, StatusFilter};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and move batches through their lifecycle")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print batches as JSON lines
    List {
        /// Only batches in this status (Upcoming, Running, Closed)
        #[arg(long)]
        status: Option<BatchStatus>,
    },
    /// Print batches grouped by status
    Board,
    /// Drag a batch onto a status column or onto another batch's card
    Move { id: String, target: String },
    /// Delete a batch if its status and enrolment allow it
    Delete { id: String },
    /// Create a batch from a JSON object
    Create {
        #[arg(long)]
        json: String,
    },
    /// Update a batch from a JSON object
    Update {
        id: String,
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let client = HttpBatchClient::from_config(&cfg)?;
    let manager = BatchManager::new(Arc::new(client), Arc::new(SystemClock));

    match args.command {
        Command::List { status } => {
            let batches = manager
                .request_batches_for_status(StatusFilter::from(status))
                .await?;
            for batch in batches {
                println!("{}", serde_json::to_string(&batch)?);
            }
        }
        Command::Board => {
            manager.request_batches_for_status(StatusFilter::All).await?;
            for (status, batches) in manager.board().await.columns() {
                println!("{} ({})", status, batches.len());
                for batch in batches {
                    let name = batch.payload.get("name").and_then(Value::as_str).unwrap_or("-");
                    println!("  {}  {}  enrolled={}", batch.id, name, batch.enrolled_count);
                }
            }
        }
        Command::Move { id, target } => {
            manager.request_batches_for_status(StatusFilter::All).await?;
            match manager.attempt_drag_transition(BatchId::new(id), &target).await? {
                DragOutcome::Committed(batch) => println!("{} is now {}", batch.id, batch.status),
                DragOutcome::Ignored(reason) => println!("not moved: {}", reason),
            }
        }
        Command::Delete { id } => {
            manager.request_batches_for_status(StatusFilter::All).await?;
            let id = BatchId::new(id);
            match manager.attempt_delete(&id).await? {
                DeleteOutcome::Deleted => println!("deleted {}", id),
                DeleteOutcome::Rejected { status, enrolled_count } => bail!(
                    "batch {} cannot be deleted: status {} with {} enrolled",
                    id,
                    status,
                    enrolled_count
                ),
            }
        }
        Command::Create { json } => {
            let batch = manager.create_batch(parse_object(&json)?).await?;
            println!("{}", serde_json::to_string(&batch)?);
        }
        Command::Update { id, json } => {
            manager.request_batches_for_status(StatusFilter::All).await?;
            let patch = BatchPatch::from_fields(parse_object(&json)?)?;
            let batch = manager.update_batch(&BatchId::new(id), patch).await?;
            println!("{}", serde_json::to_string(&batch)?);
        }
    }

    info!("done");
    Ok(())
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("--json is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("--json must be a JSON object")),
    }
}
