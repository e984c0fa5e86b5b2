use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::bulk::{
    BatchTransmitter, ConcurrencyGate, DeletionScanner, LargeLoadModeManager, LogProgressSink,
    ProcessedCounter, ProgressReporter, ProgressSink, RetryCoordinator, WriteBuffer,
    WriteOperation,
};
use crate::client::{DeletionQuery, IndexClient};
use crate::config::BulkConfig;
use crate::error::{BulkError, Result};
use crate::metrics::BulkMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSummary {
    pub index: String,
    pub processed: u64,
    pub large: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One bulk indexing session against a single index.
///
/// Operations are buffered into batches of about `flush_threshold_bytes` and
/// sent in the background, with at most `concurrency()` batches in flight.
/// `add` only waits when that limit is reached. Downstream failures never
/// surface through `add`; they are retried once and logged. `stop` waits for
/// every batch, refreshes the index and, for a large session, restores the
/// settings relaxed by `start`.
///
/// A session is started once and stopped once. `add` outside of that window
/// fails with [`BulkError::SessionClosed`].
pub struct BulkIndexer {
    client: Arc<dyn IndexClient>,
    index: String,
    config: BulkConfig,
    state: SessionState,
    buffer: WriteBuffer,
    transmitter: BatchTransmitter,
    large_mode: LargeLoadModeManager,
    progress: ProgressReporter,
    counter: ProcessedCounter,
    started_at: Option<DateTime<Utc>>,
}

impl BulkIndexer {
    pub fn new(client: Arc<dyn IndexClient>, index: impl Into<String>, config: BulkConfig) -> Self {
        Self::with_collaborators(
            client,
            index,
            config,
            Arc::new(LogProgressSink),
            Arc::new(BulkMetrics::new()),
        )
    }

    pub fn with_collaborators(
        client: Arc<dyn IndexClient>,
        index: impl Into<String>,
        config: BulkConfig,
        progress_sink: Arc<dyn ProgressSink>,
        metrics: Arc<BulkMetrics>,
    ) -> Self {
        let index = index.into();
        let counter = ProcessedCounter::new();
        let gate = ConcurrencyGate::new(config.concurrency());
        let retry = Arc::new(RetryCoordinator::new(
            Arc::clone(&client),
            index.clone(),
            config.retry_once,
            config.flush_threshold_bytes,
            Arc::clone(&metrics),
        ));
        let transmitter = BatchTransmitter::new(
            Arc::clone(&client),
            &index,
            gate,
            counter.clone(),
            retry,
            metrics,
        );
        let progress = ProgressReporter::new(
            format!("Progress[BulkIndexer[{}]]", index),
            counter.clone(),
            progress_sink,
            config.progress_interval(),
        );

        Self {
            large_mode: LargeLoadModeManager::new(Arc::clone(&client), index.clone()),
            buffer: WriteBuffer::new(config.flush_threshold_bytes),
            client,
            index,
            config,
            state: SessionState::Created,
            transmitter,
            progress,
            counter,
            started_at: None,
        }
    }

    /// Large sessions disable replicas and periodic refresh while loading.
    /// Only allowed before `start`.
    pub fn set_large(&mut self, large: bool) -> Result<&mut Self> {
        if self.state != SessionState::Created {
            return Err(BulkError::AlreadyStarted);
        }
        self.config.large = large;
        Ok(self)
    }

    pub fn is_large(&self) -> bool {
        self.config.large
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Items whose bulk call has completed, successfully or not.
    pub fn processed(&self) -> u64 {
        self.counter.get()
    }

    pub fn in_flight(&self) -> usize {
        self.transmitter.gate().in_flight()
    }

    pub fn concurrency(&self) -> usize {
        self.transmitter.gate().capacity()
    }

    pub fn pending_operations(&self) -> usize {
        self.buffer.pending_operations()
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(BulkError::AlreadyStarted);
        }
        if self.config.large {
            self.large_mode.relax().await?;
        }
        self.counter.reset();
        self.progress.start();
        self.started_at = Some(Utc::now());
        self.state = SessionState::Started;
        tracing::debug!(
            index = %self.index,
            large = self.config.large,
            concurrency = self.concurrency(),
            "Bulk indexing started"
        );
        Ok(())
    }

    pub async fn add(&mut self, op: WriteOperation) -> Result<()> {
        self.ensure_started()?;
        if let Some(batch) = self.buffer.add(op) {
            // completion is awaited through the gate, not the handle
            let _completion = self.transmitter.transmit(batch).await;
        }
        Ok(())
    }

    /// Deletes every document matching `query`. The scan itself blocks; the
    /// deletes go through the regular batching path. Returns the number of
    /// delete operations enqueued.
    pub async fn add_deletion(&mut self, query: &DeletionQuery) -> Result<u64> {
        self.ensure_started()?;
        let scanner = DeletionScanner::new(
            Arc::clone(&self.client),
            self.index.clone(),
            self.config.scroll_page_size,
            self.config.scroll_ttl(),
        );

        let mut cursor = scanner.open(query).await?;
        let mut enqueued = 0u64;
        loop {
            match cursor.next_page().await {
                Ok(Some(ops)) => {
                    for op in ops {
                        self.add(op).await?;
                        enqueued += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    cursor.close().await;
                    return Err(e);
                }
            }
        }
        let pages = cursor.pages();
        cursor.close().await;

        tracing::info!(index = %self.index, pages, enqueued, "Documents scheduled for deletion");
        Ok(enqueued)
    }

    /// Flushes, waits for every batch, refreshes the index, then merges and
    /// restores the settings of a large session. Terminal.
    pub async fn stop(&mut self) -> Result<BulkSummary> {
        self.ensure_started()?;
        self.state = SessionState::Stopped;

        if let Err(e) = self.flush_and_drain().await {
            self.progress.stop().await;
            let pending_restore = self.large_mode.abandon();
            if let Some(snapshot) = &pending_restore {
                tracing::error!(
                    index = %self.index,
                    "Index settings left relaxed, restore manually: {}",
                    snapshot
                );
            }
            return Err(match e {
                BulkError::DrainTimeout { timeout, in_flight, .. } => BulkError::DrainTimeout {
                    timeout,
                    in_flight,
                    pending_restore,
                },
                other => other,
            });
        }
        self.progress.stop().await;

        let refreshed = self.client.refresh(&self.index).await;
        if let Err(e) = &refreshed {
            tracing::error!(index = %self.index, "Fail to refresh index: {}", e);
        }
        self.large_mode.restore().await?;
        refreshed?;

        let summary = BulkSummary {
            index: self.index.clone(),
            processed: self.counter.get(),
            large: self.config.large,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
        };
        tracing::info!(
            index = %summary.index,
            processed = summary.processed,
            large = summary.large,
            "Bulk indexing finished"
        );
        Ok(summary)
    }

    /// Deletes the documents matching `query` in a session of its own and
    /// refreshes the index, so they are gone from search once this returns.
    pub async fn delete(
        client: Arc<dyn IndexClient>,
        index: impl Into<String>,
        query: &DeletionQuery,
        config: BulkConfig,
    ) -> Result<u64> {
        let mut bulk = BulkIndexer::new(client, index, BulkConfig { large: false, ..config });
        bulk.start().await?;
        let deleted = match bulk.add_deletion(query).await {
            Ok(deleted) => deleted,
            Err(e) => {
                if let Err(stop_err) = bulk.stop().await {
                    tracing::warn!("Fail to stop deletion session: {}", stop_err);
                }
                return Err(e);
            }
        };
        bulk.stop().await?;
        Ok(deleted)
    }

    /// Sends the partial batch and waits for every batch in flight. Both waits
    /// share one deadline of `drain_timeout`.
    async fn flush_and_drain(&mut self) -> Result<()> {
        let timeout = self.config.drain_timeout();
        let deadline = Instant::now() + timeout;
        let gate = Arc::clone(self.transmitter.gate());

        if let Some(batch) = self.buffer.flush_remaining() {
            let items = batch.len();
            match tokio::time::timeout_at(deadline, self.transmitter.transmit(batch)).await {
                Ok(_completion) => {}
                Err(_) => {
                    tracing::error!(
                        index = %self.index,
                        items,
                        "No bulk slot freed up before the drain deadline, last batch not sent"
                    );
                    return Err(BulkError::DrainTimeout {
                        timeout,
                        in_flight: gate.in_flight(),
                        pending_restore: None,
                    });
                }
            }
        }

        gate.drain(deadline.saturating_duration_since(Instant::now()))
            .await
            .map_err(|e| match e {
                BulkError::DrainTimeout { in_flight, .. } => BulkError::DrainTimeout {
                    timeout,
                    in_flight,
                    pending_restore: None,
                },
                other => other,
            })
    }

    fn ensure_started(&self) -> Result<()> {
        match self.state {
            SessionState::Started => Ok(()),
            SessionState::Created | SessionState::Stopped => Err(BulkError::SessionClosed),
        }
    }
}
