use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::bulk::{Batch, BatchResult, ConcurrencyGate, ProcessedCounter, RetryCoordinator};
use crate::client::IndexClient;
use crate::metrics::BulkMetrics;

/// Sends closed batches to the index under gate admission.
#[derive(Clone)]
pub struct BatchTransmitter {
    client: Arc<dyn IndexClient>,
    index: Arc<str>,
    gate: Arc<ConcurrencyGate>,
    counter: ProcessedCounter,
    retry: Arc<RetryCoordinator>,
    metrics: Arc<BulkMetrics>,
}

impl BatchTransmitter {
    pub fn new(
        client: Arc<dyn IndexClient>,
        index: &str,
        gate: Arc<ConcurrencyGate>,
        counter: ProcessedCounter,
        retry: Arc<RetryCoordinator>,
        metrics: Arc<BulkMetrics>,
    ) -> Self {
        Self {
            client,
            index: Arc::from(index),
            gate,
            counter,
            retry,
            metrics,
        }
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    /// Waits for a gate slot, then sends `batch` on a spawned task and returns
    /// without waiting for the response. The slot is held until completion
    /// handling, retry included, is over.
    pub async fn transmit(&self, batch: Batch) -> JoinHandle<BatchResult> {
        let permit = self.gate.acquire().await;
        tracing::debug!(
            items = batch.len(),
            bytes = batch.size_bytes(),
            in_flight = self.gate.in_flight(),
            "Sending bulk request"
        );

        let this = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            this.complete(batch).await
        })
    }

    async fn complete(&self, batch: Batch) -> BatchResult {
        let started = Instant::now();
        let response = self.client.bulk_write(&self.index, &batch).await;

        self.counter.add(batch.len() as u64);
        self.metrics
            .record_batch(batch.len(), batch.size_bytes(), started.elapsed().as_secs_f64());

        let result = match response {
            Ok(result) if result.len() == batch.len() => result,
            Ok(result) => {
                tracing::error!(
                    "Bulk response has {} items for {}",
                    result.len(),
                    batch
                );
                BatchResult::all_failed(batch.len(), "misaligned bulk response")
            }
            Err(e) => {
                tracing::error!("Fail to execute bulk index request: {}: {}", batch, e);
                self.metrics.record_transport_failure();
                BatchResult::all_failed(batch.len(), &e.to_string())
            }
        };

        self.retry.handle(&batch, result).await
    }
}
