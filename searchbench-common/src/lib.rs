use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;

/// Largest page a single search may request.
pub const MAX_QUERY_LIMIT: usize = 10_000;

/// Error types for SearchBench backends and tooling
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenchError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Document already indexed: {0}")]
    DuplicateDocument(String),

    #[error("Lock acquisition timed out")]
    LockTimeout,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e.to_string())
    }
}

/// JSON error envelope returned by the server for all error responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result type for SearchBench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// A searchable document. `score` orders results that match equally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default = "default_score")]
    pub score: f32,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

fn default_score() -> f32 {
    1.0
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), score: default_score(), fields: BTreeMap::new() }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Per-query behaviour switches, resolved once when the backend is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFlags {
    /// Match terms exactly as given, without prefix expansion.
    #[serde(default)]
    pub verbatim: bool,
    /// Return ids and scores only, dropping document fields.
    #[serde(default)]
    pub no_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub flags: QueryFlags,
}

fn default_limit() -> usize {
    10
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), offset: 0, limit: default_limit(), flags: QueryFlags::default() }
    }

    /// Restrict the result page to `limit` documents starting at `offset`.
    pub fn limit(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Reject queries no backend should accept.
    pub fn validate(&self) -> Result<()> {
        if tokenize(&self.text).is_empty() {
            return Err(BenchError::InvalidQuery(format!("no searchable terms in {:?}", self.text)));
        }
        if self.limit > MAX_QUERY_LIMIT {
            return Err(BenchError::InvalidQuery(format!(
                "limit {} exceeds maximum of {}",
                self.limit, MAX_QUERY_LIMIT
            )));
        }
        Ok(())
    }
}

/// Page of matching documents plus the total match count before paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<Document>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub term: String,
    pub score: f32,
}

impl Suggestion {
    pub fn new(term: impl Into<String>, score: f32) -> Self {
        Self { term: term.into(), score }
    }
}

/// Options applied to a bulk indexing call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Overwrite documents whose id is already present instead of failing.
    #[serde(default)]
    pub replace: bool,
}

/// Body of a bulk indexing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRequest {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub options: IndexOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub indexed: usize,
}

/// Split text into lower-cased alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Capability surface of a search backend.
///
/// Every call is one backend round trip. Implementations must be callable
/// concurrently from many workers.
pub trait SearchIndex: Send + Sync {
    fn create(&self) -> impl Future<Output = Result<()>> + Send;

    fn drop_index(&self) -> impl Future<Output = Result<()>> + Send;

    fn index(
        &self,
        documents: &[Document],
        options: &IndexOptions,
    ) -> impl Future<Output = Result<()>> + Send;

    fn search(&self, query: &Query) -> impl Future<Output = Result<SearchResult>> + Send;
}

/// Optional autocomplete dictionary attached to a backend.
pub trait Autocompleter: Send + Sync {
    fn add_terms(&self, terms: &[Suggestion]) -> impl Future<Output = Result<()>> + Send;

    fn suggest(
        &self,
        prefix: &str,
        limit: usize,
        fuzzy: bool,
    ) -> impl Future<Output = Result<Vec<Suggestion>>> + Send;

    /// Remove every term from the dictionary.
    fn delete(&self) -> impl Future<Output = Result<()>> + Send;
}
