use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Processed-item count shared by every batch completion of a session.
#[derive(Debug, Clone, Default)]
pub struct ProcessedCounter {
    value: Arc<AtomicU64>,
}

impl ProcessedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, items: u64) -> u64 {
        self.value.fetch_add(items, Ordering::AcqRel) + items
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}

/// Receives the running count on a fixed cadence.
pub trait ProgressSink: Send + Sync {
    fn report(&self, label: &str, processed: u64, elapsed: Duration);

    fn finished(&self, label: &str, processed: u64, elapsed: Duration) {
        self.report(label, processed, elapsed);
    }
}

#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn report(&self, label: &str, processed: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { processed as f64 / secs } else { 0.0 };
        tracing::info!(
            target: "bulk_indexer_service::progress",
            label,
            processed,
            rate_per_sec = rate,
            "{} requests processed",
            processed
        );
    }

    fn finished(&self, label: &str, processed: u64, elapsed: Duration) {
        tracing::info!(
            target: "bulk_indexer_service::progress",
            label,
            processed,
            elapsed_ms = elapsed.as_millis() as u64,
            "{} requests processed (done)",
            processed
        );
    }
}

/// Periodically hands the counter value to a sink until stopped.
pub struct ProgressReporter {
    label: String,
    counter: ProcessedCounter,
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
    running: Option<(oneshot::Sender<()>, JoinHandle<()>, Instant)>,
}

impl ProgressReporter {
    pub fn new(
        label: impl Into<String>,
        counter: ProcessedCounter,
        sink: Arc<dyn ProgressSink>,
        interval: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            counter,
            sink,
            interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let started = Instant::now();
        let label = self.label.clone();
        let counter = self.counter.clone();
        let sink = Arc::clone(&self.sink);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => sink.report(&label, counter.get(), started.elapsed()),
                }
            }
        });
        self.running = Some((stop_tx, handle, started));
    }

    /// Stops the periodic task and emits the final count.
    pub async fn stop(&mut self) {
        if let Some((stop_tx, handle, started)) = self.running.take() {
            let _ = stop_tx.send(());
            if let Err(e) = handle.await {
                tracing::warn!("Progress reporter task ended abnormally: {}", e);
            }
            self.sink
                .finished(&self.label, self.counter.get(), started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<u64>>,
        finished: Mutex<Option<u64>>,
    }

    impl ProgressSink for RecordingSink {
        fn report(&self, _label: &str, processed: u64, _elapsed: Duration) {
            self.reports.lock().unwrap().push(processed);
        }

        fn finished(&self, _label: &str, processed: u64, _elapsed: Duration) {
            *self.finished.lock().unwrap() = Some(processed);
        }
    }

    #[test]
    fn test_counter_concurrent_increment() {
        let counter = ProcessedCounter::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.add(1);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counter.get(), 8000);
    }

    #[tokio::test]
    async fn test_reporter_ticks_and_finishes() {
        let counter = ProcessedCounter::new();
        let sink = Arc::new(RecordingSink::default());
        let mut reporter = ProgressReporter::new(
            "test",
            counter.clone(),
            sink.clone(),
            Duration::from_millis(10),
        );

        reporter.start();
        assert!(reporter.is_running());
        counter.add(5);
        tokio::time::sleep(Duration::from_millis(35)).await;
        counter.add(7);
        reporter.stop().await;

        assert!(!reporter.is_running());
        assert!(!sink.reports.lock().unwrap().is_empty());
        assert_eq!(*sink.finished.lock().unwrap(), Some(12));
    }

    #[tokio::test]
    async fn test_stop_without_start_reports_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let mut reporter =
            ProgressReporter::new("idle", ProcessedCounter::new(), sink.clone(), Duration::from_secs(60));
        reporter.stop().await;
        assert_eq!(*sink.finished.lock().unwrap(), None);
    }
}
