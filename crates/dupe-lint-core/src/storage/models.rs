/// A free-text row that may mention file paths (posts, pages, widgets...).
#[derive(Debug, Clone)]
pub struct ContentRow {
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// A catalog record together with its stored sidecar blob.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub path: String,
    pub derived_metadata: Option<String>,
}

/// The text-bearing columns of one table, as discovered for reference
/// rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextColumns {
    pub table: String,
    pub columns: Vec<String>,
}
