pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;

pub use bulk::{BulkIndexer, BulkSummary, WriteOperation};
pub use client::{DeletionQuery, IndexClient};
pub use config::{BulkConfig, Config};
pub use error::{BulkError, Result};
pub use index::LocalIndexClient;
pub use metrics::{init_logging, init_metrics, BulkMetrics};
