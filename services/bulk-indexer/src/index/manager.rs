use std::path::Path;

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

use crate::error::Result;
use crate::index::IndexSchema;

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone)]
pub struct IndexManager {
    index: Index,
    schema: IndexSchema,
}

impl IndexManager {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let schema = IndexSchema::new();
        let index = Index::create_in_dir(path, schema.schema())?;
        Ok(Self { index, schema })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let index = Index::open_in_dir(path)?;
        let schema = IndexSchema::from_schema(&index.schema())?;
        Ok(Self { index, schema })
    }

    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.join("meta.json").exists() {
            Self::open(path)
        } else {
            std::fs::create_dir_all(path)?;
            Self::create(path)
        }
    }

    pub fn create_in_ram() -> Self {
        let schema = IndexSchema::new();
        let index = Index::create_in_ram(schema.schema());
        Self { index, schema }
    }

    pub fn writer(&self) -> Result<IndexWriter> {
        Ok(self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?)
    }

    /// Readers only see new commits after an explicit reload.
    pub fn reader(&self) -> Result<IndexReader> {
        Ok(self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn segment_count(&self) -> Result<usize> {
        Ok(self.index.searchable_segment_ids()?.len())
    }
}
