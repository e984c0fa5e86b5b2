//! Boundary with the index engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::bulk::{Batch, BatchResult};
use crate::error::Result;

pub const SETTING_NUMBER_OF_REPLICAS: &str = "index.number_of_replicas";
pub const SETTING_REFRESH_INTERVAL: &str = "index.refresh_interval";
/// Refresh interval value that disables periodic refresh.
pub const REFRESH_DISABLED: &str = "-1";

pub type IndexSettings = BTreeMap<String, String>;

/// Selects the documents enumerated by a delete-by-query scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeletionQuery {
    MatchAll,
    Term { field: String, value: String },
    Ids { ids: Vec<String> },
}

/// One page of a scroll cursor. `scroll_id` is `None` once the engine has
/// nothing left to return after this page.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub scroll_id: Option<String>,
    pub ids: Vec<String>,
}

#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Executes every operation of `batch`. Per-item rejections are reported in
    /// the result; an `Err` means the call failed as a whole.
    async fn bulk_write(&self, index: &str, batch: &Batch) -> Result<BatchResult>;

    /// Opens an ids-only scroll over the documents matching `query`.
    async fn open_scroll(
        &self,
        index: &str,
        query: &DeletionQuery,
        page_size: usize,
        ttl: Duration,
    ) -> Result<ScrollPage>;

    async fn continue_scroll(&self, scroll_id: &str, ttl: Duration) -> Result<ScrollPage>;

    async fn clear_scroll(&self, _scroll_id: &str) -> Result<()> {
        Ok(())
    }

    async fn get_setting(&self, index: &str, name: &str) -> Result<Option<String>>;

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<()>;

    async fn refresh(&self, index: &str) -> Result<()>;

    /// Merges the index's segments.
    async fn consolidate(&self, index: &str) -> Result<()>;
}
