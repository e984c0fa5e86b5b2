use std::sync::Arc;
use std::time::Duration;

use crate::bulk::WriteOperation;
use crate::client::{DeletionQuery, IndexClient, ScrollPage};
use crate::error::Result;

/// Enumerates the documents matching a query through an ids-only scroll and
/// turns them into delete operations.
pub struct DeletionScanner {
    client: Arc<dyn IndexClient>,
    index: String,
    page_size: usize,
    ttl: Duration,
}

impl DeletionScanner {
    pub fn new(
        client: Arc<dyn IndexClient>,
        index: impl Into<String>,
        page_size: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            page_size: page_size.max(1),
            ttl,
        }
    }

    pub async fn open(&self, query: &DeletionQuery) -> Result<ScrollCursor<'_>> {
        let first = self
            .client
            .open_scroll(&self.index, query, self.page_size, self.ttl)
            .await?;
        tracing::debug!(index = %self.index, ?query, "Scroll opened for deletion");
        Ok(ScrollCursor {
            scanner: self,
            pending: Some(first),
            scroll_id: None,
            exhausted: false,
            pages: 0,
        })
    }
}

pub struct ScrollCursor<'a> {
    scanner: &'a DeletionScanner,
    pending: Option<ScrollPage>,
    scroll_id: Option<String>,
    exhausted: bool,
    pages: usize,
}

impl ScrollCursor<'_> {
    /// Delete operations for the next non-empty page, or `None` once the
    /// scroll is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<WriteOperation>>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            let (page, opening) = match self.pending.take() {
                Some(page) => (page, true),
                None => match self.scroll_id.as_deref() {
                    Some(id) => (
                        self.scanner.client.continue_scroll(id, self.scanner.ttl).await?,
                        false,
                    ),
                    None => {
                        self.exhausted = true;
                        return Ok(None);
                    }
                },
            };

            self.scroll_id = page.scroll_id;
            if page.ids.is_empty() {
                // the opening response may carry only a cursor
                if opening && self.scroll_id.is_some() {
                    continue;
                }
                self.exhausted = true;
                return Ok(None);
            }
            if self.scroll_id.is_none() {
                self.exhausted = true;
            }

            self.pages += 1;
            return Ok(Some(page.ids.into_iter().map(WriteOperation::delete).collect()));
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Releases the server-side cursor if one is still open.
    pub async fn close(self) {
        if let Some(id) = self.scroll_id {
            if let Err(e) = self.scanner.client.clear_scroll(&id).await {
                tracing::warn!("Fail to clear scroll {}: {}", id, e);
            }
        }
    }
}
