use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub total_documents: u64,
    pub segments: usize,
    pub open_scrolls: usize,
    pub refresh_enabled: bool,
}
