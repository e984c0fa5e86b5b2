use metrics::{counter, histogram, Counter, Histogram};

pub fn init_logging() {
    init_logging_with("bulk_indexer_service=info");
}

pub fn init_logging_with(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.to_string().into()),
        )
        .init();
}

pub fn init_metrics() {
    metrics::describe_counter!(
        "bulk_batches_total",
        "Total number of bulk batches transmitted"
    );
    metrics::describe_counter!(
        "bulk_items_total",
        "Total number of write operations processed"
    );
    metrics::describe_counter!(
        "bulk_item_failures_total",
        "Total number of write operations still failing after retry"
    );
    metrics::describe_counter!(
        "bulk_retries_total",
        "Total number of write operations resubmitted"
    );
    metrics::describe_counter!(
        "bulk_transport_failures_total",
        "Total number of bulk calls that failed as a whole"
    );
    metrics::describe_histogram!(
        "bulk_batch_bytes",
        "Estimated serialized size of transmitted batches"
    );
    metrics::describe_histogram!(
        "bulk_batch_duration_seconds",
        "Bulk call duration"
    );
}

/// Metric handles shared by every batch completion of a session.
pub struct BulkMetrics {
    pub batches_total: Counter,
    pub items_total: Counter,
    pub item_failures_total: Counter,
    pub retries_total: Counter,
    pub transport_failures_total: Counter,
    pub batch_bytes: Histogram,
    pub batch_duration: Histogram,
}

impl BulkMetrics {
    pub fn new() -> Self {
        BulkMetrics {
            batches_total: counter!("bulk_batches_total"),
            items_total: counter!("bulk_items_total"),
            item_failures_total: counter!("bulk_item_failures_total"),
            retries_total: counter!("bulk_retries_total"),
            transport_failures_total: counter!("bulk_transport_failures_total"),
            batch_bytes: histogram!("bulk_batch_bytes"),
            batch_duration: histogram!("bulk_batch_duration_seconds"),
        }
    }

    pub fn record_batch(&self, items: usize, bytes: usize, duration: f64) {
        self.batches_total.increment(1);
        self.items_total.increment(items as u64);
        self.batch_bytes.record(bytes as f64);
        self.batch_duration.record(duration);
    }

    pub fn record_retry(&self, items: usize) {
        self.retries_total.increment(items as u64);
    }

    pub fn record_item_failures(&self, items: usize) {
        self.item_failures_total.increment(items as u64);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures_total.increment(1);
    }
}

impl Default for BulkMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = BulkMetrics::new();
        metrics.record_batch(10, 2048, 0.05);
        metrics.record_retry(2);
        metrics.record_item_failures(1);
        metrics.record_transport_failure();
    }
}
