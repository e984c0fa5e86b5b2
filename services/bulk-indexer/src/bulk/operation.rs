use serde::Serialize;
use serde_json::json;
use std::fmt;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Index,
    Delete,
}

/// A single write against the target index. The size estimate is taken from
/// the bulk wire form (action line plus source line) when the operation is
/// built and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    id: String,
    source: Option<String>,
    size: usize,
}

impl WriteOperation {
    pub fn index<T: Serialize + ?Sized>(id: impl Into<String>, document: &T) -> Result<Self> {
        let source = serde_json::to_string(document)?;
        Ok(Self::index_raw(id, source))
    }

    /// Builds an index operation from an already serialized JSON source.
    pub fn index_raw(id: impl Into<String>, source: impl Into<String>) -> Self {
        let id = id.into();
        let source = source.into();
        let size = action_line("index", &id).len() + 1 + source.len() + 1;
        Self {
            id,
            source: Some(source),
            size,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        let id = id.into();
        let size = action_line("delete", &id).len() + 1;
        Self {
            id,
            source: None,
            size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        match self.source {
            Some(_) => OperationKind::Index,
            None => OperationKind::Delete,
        }
    }

    /// The JSON source of an index operation.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn estimated_size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            OperationKind::Index => write!(f, "index [{}]", self.id),
            OperationKind::Delete => write!(f, "delete [{}]", self.id),
        }
    }
}

fn action_line(action: &str, id: &str) -> String {
    json!({ action: { "_id": id } }).to_string()
}

/// An ordered group of operations sent to the index in one call.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    operations: Vec<WriteOperation>,
    size_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOperation) {
        self.size_bytes += op.estimated_size();
        self.operations.push(op);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    pub fn get(&self, position: usize) -> Option<&WriteOperation> {
        self.operations.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WriteOperation> {
        self.operations.iter()
    }
}

impl FromIterator<WriteOperation> for Batch {
    fn from_iter<I: IntoIterator<Item = WriteOperation>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for op in iter {
            batch.push(op);
        }
        batch
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 5;
        write!(f, "Batch[items={}, bytes={}", self.len(), self.size_bytes)?;
        if !self.is_empty() {
            let shown: Vec<String> = self.operations.iter().take(SHOWN).map(|op| op.to_string()).collect();
            write!(f, ", ops=[{}", shown.join(", "))?;
            if self.len() > SHOWN {
                write!(f, ", ...")?;
            }
            write!(f, "]")?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Success,
    Failure { item: usize, reason: String },
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failure { .. })
    }
}

/// Per-item outcomes of one bulk call, positionally aligned with the batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    items: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn new(items: Vec<ItemOutcome>) -> Self {
        Self { items }
    }

    pub fn all_succeeded(len: usize) -> Self {
        Self {
            items: vec![ItemOutcome::Success; len],
        }
    }

    /// Outcome used when the bulk call itself failed.
    pub fn all_failed(len: usize, reason: &str) -> Self {
        Self {
            items: (0..len)
                .map(|item| ItemOutcome::Failure {
                    item,
                    reason: reason.to_string(),
                })
                .collect(),
        }
    }

    pub fn items(&self) -> &[ItemOutcome] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(ItemOutcome::is_failure)
    }

    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.items.len() - self.success_count()
    }

    /// `(position, reason)` of each failed item.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.items.iter().enumerate().filter_map(|(pos, outcome)| match outcome {
            ItemOutcome::Failure { reason, .. } => Some((pos, reason.as_str())),
            ItemOutcome::Success => None,
        })
    }

    /// Folds the outcome of a retry back into this result. `positions[i]` is
    /// the original position of the i-th retried item.
    pub fn merge_retry(&mut self, positions: &[usize], retry: &BatchResult) {
        for (outcome, &pos) in retry.items.iter().zip(positions) {
            if let Some(slot) = self.items.get_mut(pos) {
                *slot = match outcome {
                    ItemOutcome::Success => ItemOutcome::Success,
                    ItemOutcome::Failure { reason, .. } => ItemOutcome::Failure {
                        item: pos,
                        reason: reason.clone(),
                    },
                };
            }
        }
    }
}
