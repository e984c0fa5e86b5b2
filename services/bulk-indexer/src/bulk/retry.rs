use std::sync::Arc;

use crate::bulk::{Batch, BatchResult};
use crate::client::IndexClient;
use crate::metrics::BulkMetrics;

/// Resubmits the failed items of a completed batch, once.
pub struct RetryCoordinator {
    client: Arc<dyn IndexClient>,
    index: String,
    enabled: bool,
    chunk_bytes: usize,
    metrics: Arc<BulkMetrics>,
}

impl RetryCoordinator {
    pub fn new(
        client: Arc<dyn IndexClient>,
        index: impl Into<String>,
        enabled: bool,
        chunk_bytes: usize,
        metrics: Arc<BulkMetrics>,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            enabled,
            chunk_bytes: chunk_bytes.max(1),
            metrics,
        }
    }

    /// Returns `result` with the outcome of the retry folded in. Items still
    /// failing afterwards are logged and never resubmitted again.
    pub async fn handle(&self, batch: &Batch, result: BatchResult) -> BatchResult {
        if !result.has_failures() {
            return result;
        }

        let positions: Vec<usize> = result.failures().map(|(pos, _)| pos).collect();
        if !self.enabled {
            self.report_failures(batch, &result);
            return result;
        }

        tracing::warn!(
            index = %self.index,
            "{} index requests failed. Trying again.",
            positions.len()
        );
        self.metrics.record_retry(positions.len());

        let mut merged = result;
        for chunk in self.chunk(batch, &positions) {
            let retry: Batch = chunk
                .iter()
                .filter_map(|&pos| batch.get(pos).cloned())
                .collect();

            let retry_result = match self.client.bulk_write(&self.index, &retry).await {
                Ok(outcome) if outcome.len() == retry.len() => outcome,
                Ok(outcome) => {
                    tracing::error!(
                        "Retry response has {} items for {} requests",
                        outcome.len(),
                        retry.len()
                    );
                    BatchResult::all_failed(retry.len(), "misaligned bulk response")
                }
                Err(e) => {
                    tracing::error!("Fail to execute retry bulk request: {}: {}", retry, e);
                    self.metrics.record_transport_failure();
                    BatchResult::all_failed(retry.len(), &e.to_string())
                }
            };
            merged.merge_retry(&chunk, &retry_result);
        }

        if merged.has_failures() {
            tracing::error!(index = %self.index, "New attempt to index documents failed");
            self.report_failures(batch, &merged);
        } else {
            tracing::info!(index = %self.index, "New index attempt succeeded");
        }
        merged
    }

    /// Splits failed positions into groups whose operations stay within the
    /// flush threshold. An oversized operation gets a group of its own.
    fn chunk(&self, batch: &Batch, positions: &[usize]) -> Vec<Vec<usize>> {
        let mut chunks = Vec::new();
        let mut current = Vec::new();
        let mut current_bytes = 0;

        for &pos in positions {
            let size = batch.get(pos).map(|op| op.estimated_size()).unwrap_or(0);
            if !current.is_empty() && current_bytes + size > self.chunk_bytes {
                chunks.push(std::mem::take(&mut current));
                current_bytes = 0;
            }
            current.push(pos);
            current_bytes += size;
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn report_failures(&self, batch: &Batch, result: &BatchResult) {
        let mut failed = 0;
        for (pos, reason) in result.failures() {
            failed += 1;
            match batch.get(pos) {
                Some(op) => tracing::error!(
                    "[{}]: index [{}], {}, message [{}]",
                    pos,
                    self.index,
                    op,
                    reason
                ),
                None => tracing::error!("[{}]: index [{}], message [{}]", pos, self.index, reason),
            }
        }
        self.metrics.record_item_failures(failed);
    }
}
