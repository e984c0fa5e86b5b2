use std::sync::Arc;

use anyhow::Context;
use bulk_indexer_service::{BulkIndexer, Config, DeletionQuery, LocalIndexClient, WriteOperation};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// One line of the input stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
    Index { id: String, doc: serde_json::Value },
    Delete { id: String },
    DeleteByQuery { query: DeletionQuery },
}

#[derive(Debug, Serialize)]
struct RunReport {
    #[serde(flatten)]
    summary: bulk_indexer_service::BulkSummary,
    #[serde(flatten)]
    counts: FeedCounts,
    documents: u64,
}

#[derive(Debug, Default, Serialize)]
struct FeedCounts {
    lines: u64,
    skipped: u64,
    scheduled_deletions: u64,
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("failed to load {}", path)),
        Err(_) => Config::from_env(),
    }
}

async fn open_input(path: Option<String>) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path.as_deref() {
        None | Some("-") => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

async fn feed(
    bulk: &mut BulkIndexer,
    input: &mut (dyn AsyncBufRead + Unpin + Send),
) -> anyhow::Result<FeedCounts> {
    let mut counts = FeedCounts::default();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        counts.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command = match serde_json::from_str::<Command>(trimmed) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(line = counts.lines, "Skipping malformed operation: {}", e);
                counts.skipped += 1;
                continue;
            }
        };
        match command {
            Command::Index { id, doc } => bulk.add(WriteOperation::index(id, &doc)?).await?,
            Command::Delete { id } => bulk.add(WriteOperation::delete(id)).await?,
            Command::DeleteByQuery { query } => {
                counts.scheduled_deletions += bulk.add_deletion(&query).await?;
            }
        }
    }
    Ok(counts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bulk_indexer_service::init_logging();
    bulk_indexer_service::init_metrics();

    let config = load_config()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let client = Arc::new(LocalIndexClient::open_or_create(&config.index)?);
    let mut input = open_input(std::env::args().nth(1)).await?;

    let mut bulk = BulkIndexer::new(client.clone(), config.index.name.clone(), config.bulk.clone());
    bulk.start().await?;

    let fed = feed(&mut bulk, &mut *input).await;
    if let Err(e) = &fed {
        tracing::error!("Fail to read operations, stopping session: {:#}", e);
    }
    let summary = bulk.stop().await?;
    let counts = fed?;

    let report = RunReport {
        summary,
        counts,
        documents: client.num_docs(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
