use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tantivy::{IndexReader, IndexWriter, Term};

use crate::bulk::{Batch, BatchResult, ItemOutcome};
use crate::client::{
    DeletionQuery, IndexClient, IndexSettings, ScrollPage, SETTING_NUMBER_OF_REPLICAS,
    SETTING_REFRESH_INTERVAL,
};
use crate::config::IndexConfig;
use crate::error::{BulkError, Result};
use crate::index::query::{build_query, matching_ids};
use crate::index::{IndexManager, IndexStats, ScrollRegistry, SettingsStore};

/// [`IndexClient`] over a single embedded tantivy index.
///
/// Every bulk call is one commit. Committed documents become searchable
/// on the next reload of the reader, which happens after each commit
/// unless the refresh interval is `-1`, and on every `refresh`.
#[derive(Clone)]
pub struct LocalIndexClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    manager: IndexManager,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    settings: SettingsStore,
    scrolls: ScrollRegistry,
}

impl LocalIndexClient {
    /// Opens the index stored under `<data_dir>/<name>`, creating it with
    /// the configured settings if it does not exist.
    pub fn open_or_create(config: &IndexConfig) -> Result<Self> {
        let dir = Path::new(&config.data_dir).join(&config.name);
        let manager = IndexManager::open_or_create(&dir)?;
        let settings = SettingsStore::load_or_init(&dir, default_settings(config))?;
        let client = Self::from_parts(config.name.clone(), manager, settings)?;
        tracing::info!(index = %config.name, path = %dir.display(), "Index opened");
        Ok(client)
    }

    pub fn in_memory(config: &IndexConfig) -> Result<Self> {
        let settings = SettingsStore::in_memory(default_settings(config))?;
        Self::from_parts(config.name.clone(), IndexManager::create_in_ram(), settings)
    }

    fn from_parts(name: String, manager: IndexManager, settings: SettingsStore) -> Result<Self> {
        let writer = manager.writer()?;
        let reader = manager.reader()?;
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                manager,
                writer: Mutex::new(writer),
                reader,
                settings,
                scrolls: ScrollRegistry::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Document count as seen by the last reload.
    pub fn num_docs(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            name: self.inner.name.clone(),
            total_documents: self.num_docs(),
            segments: self.inner.manager.segment_count()?,
            open_scrolls: self.inner.scrolls.len(),
            refresh_enabled: self.inner.settings.refresh_enabled(),
        })
    }

    pub fn settings(&self) -> IndexSettings {
        self.inner.settings.snapshot()
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner)).await?
    }
}

impl Inner {
    fn check_index(&self, index: &str) -> Result<()> {
        if index == self.name {
            Ok(())
        } else {
            Err(BulkError::IndexNotFound(index.to_string()))
        }
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>> {
        self.writer
            .lock()
            .map_err(|_| BulkError::InternalError("index writer lock poisoned".to_string()))
    }

    fn apply(&self, batch: &Batch) -> Result<BatchResult> {
        let schema = self.manager.schema();
        let mut writer = self.lock_writer()?;
        let mut outcomes = Vec::with_capacity(batch.len());

        for (item, op) in batch.iter().enumerate() {
            let id_term = Term::from_field_text(schema.document_id, op.id());
            let outcome = match op.source() {
                Some(source) => match schema.to_document(op.id(), source) {
                    Ok(doc) => {
                        writer.delete_term(id_term);
                        match writer.add_document(doc) {
                            Ok(_) => ItemOutcome::Success,
                            Err(e) => ItemOutcome::Failure {
                                item,
                                reason: e.to_string(),
                            },
                        }
                    }
                    Err(reason) => ItemOutcome::Failure { item, reason },
                },
                None => {
                    writer.delete_term(id_term);
                    ItemOutcome::Success
                }
            };
            outcomes.push(outcome);
        }

        writer.commit()?;
        drop(writer);

        if self.settings.refresh_enabled() {
            self.reader.reload()?;
        }
        Ok(BatchResult::new(outcomes))
    }

    fn scan(&self, query: &DeletionQuery) -> Result<Vec<String>> {
        let schema = self.manager.schema();
        let query = build_query(query, schema)?;
        let searcher = self.reader.searcher();
        matching_ids(&searcher, query.as_ref(), schema)
    }

    fn consolidate(&self) -> Result<()> {
        let mut writer = self.lock_writer()?;
        let segments = self.manager.index().searchable_segment_ids()?;
        if segments.len() > 1 {
            let merged = segments.len();
            writer.merge(&segments).wait()?;
            tracing::debug!(index = %self.name, merged, "Segments merged");
        }
        Ok(())
    }
}

#[async_trait]
impl IndexClient for LocalIndexClient {
    async fn bulk_write(&self, index: &str, batch: &Batch) -> Result<BatchResult> {
        self.inner.check_index(index)?;
        if batch.is_empty() {
            return Ok(BatchResult::default());
        }
        let batch = batch.clone();
        self.blocking(move |inner| inner.apply(&batch)).await
    }

    async fn open_scroll(
        &self,
        index: &str,
        query: &DeletionQuery,
        page_size: usize,
        ttl: Duration,
    ) -> Result<ScrollPage> {
        self.inner.check_index(index)?;
        let query = query.clone();
        let ids = self.blocking(move |inner| inner.scan(&query)).await?;
        Ok(self.inner.scrolls.open(ids, page_size, ttl))
    }

    async fn continue_scroll(&self, scroll_id: &str, ttl: Duration) -> Result<ScrollPage> {
        self.inner.scrolls.next(scroll_id, ttl)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.inner.scrolls.clear(scroll_id);
        Ok(())
    }

    async fn get_setting(&self, index: &str, name: &str) -> Result<Option<String>> {
        self.inner.check_index(index)?;
        Ok(self.inner.settings.get(name))
    }

    async fn update_settings(&self, index: &str, settings: &IndexSettings) -> Result<()> {
        self.inner.check_index(index)?;
        self.inner.settings.update(settings)?;
        tracing::debug!(index, ?settings, "Index settings updated");
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.inner.check_index(index)?;
        self.inner.reader.reload()?;
        Ok(())
    }

    async fn consolidate(&self, index: &str) -> Result<()> {
        self.inner.check_index(index)?;
        self.blocking(|inner| inner.consolidate()).await
    }
}

fn default_settings(config: &IndexConfig) -> IndexSettings {
    let mut settings = IndexSettings::new();
    settings.insert(SETTING_NUMBER_OF_REPLICAS.to_string(), config.replicas.to_string());
    settings.insert(SETTING_REFRESH_INTERVAL.to_string(), config.refresh_interval.clone());
    settings
}
