use serde_json::Value;
use tantivy::schema::{Field, Schema, TantivyDocument, STORED, STRING, TEXT};

use crate::error::Result;

pub const FIELD_DOCUMENT_ID: &str = "document_id";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_SOURCE: &str = "source";

#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub document_id: Field,
    pub title: Field,
    pub content: Field,
    pub source: Field,
    schema: Schema,
}

impl IndexSchema {
    pub fn new() -> Self {
        let mut schema_builder = Schema::builder();
        let document_id = schema_builder.add_text_field(FIELD_DOCUMENT_ID, STRING | STORED);
        let title = schema_builder.add_text_field(FIELD_TITLE, TEXT | STORED);
        let content = schema_builder.add_text_field(FIELD_CONTENT, TEXT);
        let source = schema_builder.add_text_field(FIELD_SOURCE, STORED);

        IndexSchema {
            document_id,
            title,
            content,
            source,
            schema: schema_builder.build(),
        }
    }

    /// Resolves the fields of an index created by [`IndexSchema::new`].
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(IndexSchema {
            document_id: schema.get_field(FIELD_DOCUMENT_ID)?,
            title: schema.get_field(FIELD_TITLE)?,
            content: schema.get_field(FIELD_CONTENT)?,
            source: schema.get_field(FIELD_SOURCE)?,
            schema: schema.clone(),
        })
    }

    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        self.schema.get_field(name).ok()
    }

    /// Builds the stored document for a JSON source. The error is the
    /// rejection reason reported for that item.
    pub fn to_document(&self, document_id: &str, source: &str) -> std::result::Result<TantivyDocument, String> {
        if document_id.is_empty() {
            return Err("document id is missing".to_string());
        }
        let value: Value = serde_json::from_str(source)
            .map_err(|e| format!("failed to parse source: {}", e))?;
        let fields = value
            .as_object()
            .ok_or_else(|| "source is not a JSON object".to_string())?;

        let mut doc = TantivyDocument::new();
        doc.add_text(self.document_id, document_id);
        doc.add_text(self.source, source);

        for (key, value) in fields {
            if let Some(text) = value.as_str() {
                if key == FIELD_TITLE {
                    doc.add_text(self.title, text);
                } else if key == FIELD_CONTENT {
                    doc.add_text(self.content, text);
                }
            }
        }

        Ok(doc)
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::new()
    }
}
