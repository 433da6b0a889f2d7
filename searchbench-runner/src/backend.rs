use clap::ValueEnum;
use searchbench_client::{ClientConfig, HttpIndex};
use searchbench_common::{
    Autocompleter, Document, IndexOptions, Query, QueryFlags, Result, SearchIndex, SearchResult,
    Suggestion,
};
use searchbench_server::engine::MemoryIndex;
use std::sync::Arc;

/// Search engine a benchmark targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// In-process inverted index.
    Memory,
    /// A searchbench-server compatible HTTP endpoint.
    Http,
}

impl Engine {
    pub fn as_name(&self) -> &'static str {
        match self {
            Engine::Memory => "memory",
            Engine::Http => "http",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "memory" => Some(Engine::Memory),
            "http" => Some(Engine::Http),
            _ => None,
        }
    }

    /// Query flags benchmark searches run with on this engine. The in-process
    /// index runs exact-term lookups; remote engines use their defaults.
    pub fn query_flags(&self) -> QueryFlags {
        match self {
            Engine::Memory => QueryFlags { verbatim: true, no_content: false },
            Engine::Http => QueryFlags::default(),
        }
    }
}

/// The backend chosen for this process, usable as both an index and an
/// autocompleter.
#[derive(Clone)]
pub enum Backend {
    Memory(Arc<MemoryIndex>),
    Http(HttpIndex),
}

impl Backend {
    /// `host` is ignored by the memory engine.
    pub fn select(engine: Engine, host: &str, index: &str) -> Self {
        match engine {
            Engine::Memory => Backend::Memory(Arc::new(MemoryIndex::new(index))),
            Engine::Http => Backend::Http(HttpIndex::new(ClientConfig {
                addr: host.to_string(),
                index: index.to_string(),
            })),
        }
    }

    pub fn engine(&self) -> Engine {
        match self {
            Backend::Memory(_) => Engine::Memory,
            Backend::Http(_) => Engine::Http,
        }
    }
}

impl SearchIndex for Backend {
    async fn create(&self) -> Result<()> {
        match self {
            Backend::Memory(idx) => idx.create().await,
            Backend::Http(idx) => idx.create().await,
        }
    }

    async fn drop_index(&self) -> Result<()> {
        match self {
            Backend::Memory(idx) => idx.drop_index().await,
            Backend::Http(idx) => idx.drop_index().await,
        }
    }

    async fn index(&self, documents: &[Document], options: &IndexOptions) -> Result<()> {
        match self {
            Backend::Memory(idx) => idx.index(documents, options).await,
            Backend::Http(idx) => idx.index(documents, options).await,
        }
    }

    async fn search(&self, query: &Query) -> Result<SearchResult> {
        match self {
            Backend::Memory(idx) => idx.search(query).await,
            Backend::Http(idx) => idx.search(query).await,
        }
    }
}

impl Autocompleter for Backend {
    async fn add_terms(&self, terms: &[Suggestion]) -> Result<()> {
        match self {
            Backend::Memory(idx) => idx.add_terms(terms).await,
            Backend::Http(idx) => idx.add_terms(terms).await,
        }
    }

    async fn suggest(&self, prefix: &str, limit: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
        match self {
            Backend::Memory(idx) => idx.suggest(prefix, limit, fuzzy).await,
            Backend::Http(idx) => idx.suggest(prefix, limit, fuzzy).await,
        }
    }

    async fn delete(&self) -> Result<()> {
        match self {
            Backend::Memory(idx) => idx.delete().await,
            Backend::Http(idx) => idx.delete().await,
        }
    }
}
