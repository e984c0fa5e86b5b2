use std::collections::HashSet;

use tantivy::collector::DocSetCollector;
use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, FieldType, IndexRecordOption, TantivyDocument, Value};
use tantivy::{DocAddress, Searcher, Term};

use crate::client::DeletionQuery;
use crate::error::{BulkError, Result};
use crate::index::IndexSchema;

pub fn build_query(query: &DeletionQuery, schema: &IndexSchema) -> Result<Box<dyn Query>> {
    match query {
        DeletionQuery::MatchAll => Ok(Box::new(AllQuery)),
        DeletionQuery::Term { field, value } => {
            let field_handle = schema
                .field(field)
                .ok_or_else(|| BulkError::InvalidQuery(format!("unknown field [{}]", field)))?;
            let term_text = term_text(schema, field_handle, field, value)?;
            Ok(Box::new(TermQuery::new(
                Term::from_field_text(field_handle, &term_text),
                IndexRecordOption::Basic,
            )))
        }
        DeletionQuery::Ids { ids } => {
            if ids.is_empty() {
                return Ok(Box::new(EmptyQuery {}));
            }
            let clauses: Vec<(Occur, Box<dyn Query>)> = ids
                .iter()
                .map(|id| {
                    let term = Term::from_field_text(schema.document_id, id);
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, query)
                })
                .collect();
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }
}

/// Ids of every document matching `query` in the searcher's view, in
/// index order.
pub fn matching_ids(searcher: &Searcher, query: &dyn Query, schema: &IndexSchema) -> Result<Vec<String>> {
    let addresses: HashSet<DocAddress> = searcher.search(query, &DocSetCollector)?;
    let mut addresses: Vec<DocAddress> = addresses.into_iter().collect();
    addresses.sort();

    let mut ids = Vec::with_capacity(addresses.len());
    for address in addresses {
        let doc: TantivyDocument = searcher.doc(address)?;
        if let Some(id) = extract_text(&doc, schema.document_id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn term_text(schema: &IndexSchema, field: Field, name: &str, value: &str) -> Result<String> {
    let entry = schema.schema().get_field_entry(field).clone();
    match entry.field_type() {
        FieldType::Str(options) => match options.get_indexing_options() {
            // Tokenized fields are lowercased at index time.
            Some(indexing) if indexing.tokenizer() == "default" => Ok(value.to_lowercase()),
            Some(_) => Ok(value.to_string()),
            None => Err(BulkError::InvalidQuery(format!("field [{}] is not indexed", name))),
        },
        _ => Err(BulkError::InvalidQuery(format!("field [{}] is not a text field", name))),
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> Option<String> {
    doc.get_first(field)
        .and_then(|value| value.as_str())
        .map(str::to_string)
}
