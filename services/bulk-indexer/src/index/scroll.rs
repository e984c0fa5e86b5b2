use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::client::ScrollPage;
use crate::error::{BulkError, Result};

#[derive(Debug)]
struct ScrollContext {
    remaining: VecDeque<String>,
    page_size: usize,
    expires_at: Instant,
}

impl ScrollContext {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScrollStats {
    pub opened: u64,
    pub open: usize,
    pub expired: u64,
}

/// Open scroll cursors, each kept alive for its TTL after the last page
/// request.
pub struct ScrollRegistry {
    entries: Arc<RwLock<HashMap<String, ScrollContext>>>,
    next_id: AtomicU64,
    stats: Arc<RwLock<ScrollStats>>,
}

impl ScrollRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            stats: Arc::new(RwLock::new(ScrollStats::default())),
        }
    }

    /// Registers the matching ids and returns the first page.
    pub fn open(&self, ids: Vec<String>, page_size: usize, ttl: Duration) -> ScrollPage {
        self.cleanup();

        let scroll_id = format!("scroll-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut context = ScrollContext {
            remaining: ids.into(),
            page_size: page_size.max(1),
            expires_at: Instant::now() + ttl,
        };
        let page = take_page(&mut context);
        self.update_stats(|s| s.opened += 1);

        if context.remaining.is_empty() {
            return ScrollPage {
                scroll_id: None,
                ids: page,
            };
        }

        let mut entries = self.write_entries("open");
        entries.insert(scroll_id.clone(), context);
        let open = entries.len();
        self.update_stats(|s| s.open = open);
        ScrollPage {
            scroll_id: Some(scroll_id),
            ids: page,
        }
    }

    pub fn next(&self, scroll_id: &str, ttl: Duration) -> Result<ScrollPage> {
        let now = Instant::now();
        let mut entries = self.write_entries("next");

        let context = match entries.get_mut(scroll_id) {
            Some(context) if !context.is_expired(now) => context,
            Some(_) => {
                entries.remove(scroll_id);
                self.update_stats(|s| s.expired += 1);
                return Err(BulkError::ScrollNotFound(scroll_id.to_string()));
            }
            None => return Err(BulkError::ScrollNotFound(scroll_id.to_string())),
        };

        context.expires_at = now + ttl;
        let page = take_page(context);
        let exhausted = context.remaining.is_empty();
        if exhausted {
            entries.remove(scroll_id);
        }
        let open = entries.len();
        self.update_stats(|s| s.open = open);

        Ok(ScrollPage {
            scroll_id: if exhausted { None } else { Some(scroll_id.to_string()) },
            ids: page,
        })
    }

    pub fn clear(&self, scroll_id: &str) -> bool {
        let mut entries = self.write_entries("clear");
        let removed = entries.remove(scroll_id).is_some();
        let open = entries.len();
        self.update_stats(|s| s.open = open);
        removed
    }

    /// Drops expired cursors, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write_entries("cleanup");
        let before = entries.len();
        entries.retain(|_, context| !context.is_expired(now));
        let removed = before.saturating_sub(entries.len());
        let open = entries.len();
        self.update_stats(|s| {
            s.expired += removed as u64;
            s.open = open;
        });
        removed
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ScrollStats {
        match self.stats.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write_entries(&self, operation: &str) -> RwLockWriteGuard<'_, HashMap<String, ScrollContext>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("ScrollRegistry: lock poisoned in {} operation, recovering", operation);
                poisoned.into_inner()
            }
        }
    }

    fn update_stats<F>(&self, f: F)
    where
        F: FnOnce(&mut ScrollStats),
    {
        let mut stats = match self.stats.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut stats);
    }
}

impl Default for ScrollRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn take_page(context: &mut ScrollContext) -> Vec<String> {
    let take = context.page_size.min(context.remaining.len());
    context.remaining.drain(..take).collect()
}
