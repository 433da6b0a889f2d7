use searchbench_common::{Autocompleter, BenchError, Query, QueryFlags, Result, SearchIndex};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Results requested per benchmark query.
pub const SEARCH_PAGE_SIZE: usize = 5;

/// Suggestions requested per autocomplete lookup.
pub const SUGGEST_LIMIT: usize = 5;

/// One timed unit of work against a backend.
///
/// `worker` is the caller's 0-based identity. Implementations are invoked
/// concurrently from every worker and must advance their own input selection.
pub trait Operation: Send + Sync + 'static {
    fn execute(&self, worker: usize) -> impl Future<Output = Result<()>> + Send;
}

impl<F, Fut> Operation for F
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    fn execute(&self, worker: usize) -> impl Future<Output = Result<()>> + Send {
        self(worker)
    }
}

/// Runs one query per invocation, cycling through a fixed query pool.
///
/// Worker `w` on its `n`-th call runs `queries[(w + concurrency * n) % len]`,
/// so workers interleave over the pool without sharing a cursor.
pub struct SearchOperation<I> {
    index: I,
    queries: Vec<Query>,
    concurrency: usize,
    /// Per-worker invocation counts; each slot is only advanced by its worker.
    counters: Box<[AtomicU64]>,
}

impl<I: SearchIndex + 'static> SearchOperation<I> {
    pub fn new(index: I, queries: &[String], concurrency: usize, flags: QueryFlags) -> Result<Self> {
        if queries.is_empty() {
            return Err(BenchError::Config("query pool is empty".to_string()));
        }
        let queries = queries
            .iter()
            .map(|text| {
                let query = Query::new(text.as_str()).limit(0, SEARCH_PAGE_SIZE).with_flags(flags);
                query.validate().map(|()| query)
            })
            .collect::<Result<Vec<_>>>()?;
        let concurrency = concurrency.max(1);
        Ok(Self {
            index,
            queries,
            concurrency,
            counters: (0..concurrency).map(|_| AtomicU64::new(0)).collect(),
        })
    }

    /// The query worker `worker` runs on its `local`-th invocation.
    pub fn query_for(&self, worker: usize, local: u64) -> &Query {
        let slot = (worker as u64).wrapping_add((self.concurrency as u64).wrapping_mul(local));
        &self.queries[(slot % self.queries.len() as u64) as usize]
    }

    pub fn index(&self) -> &I {
        &self.index
    }
}

impl<I: SearchIndex + 'static> Operation for SearchOperation<I> {
    async fn execute(&self, worker: usize) -> Result<()> {
        let local = self.counters[worker % self.counters.len()].fetch_add(1, Ordering::Relaxed);
        self.index.search(self.query_for(worker, local)).await?;
        Ok(())
    }
}

/// Runs one autocomplete lookup per invocation, cycling through a prefix pool
/// by global invocation count.
pub struct SuggestOperation<A> {
    autocompleter: A,
    prefixes: Vec<String>,
    fuzzy: bool,
    invocations: AtomicU64,
}

impl<A: Autocompleter + 'static> SuggestOperation<A> {
    pub fn new(autocompleter: A, prefixes: Vec<String>, fuzzy: bool) -> Result<Self> {
        if prefixes.is_empty() {
            return Err(BenchError::Config("prefix pool is empty".to_string()));
        }
        Ok(Self { autocompleter, prefixes, fuzzy, invocations: AtomicU64::new(0) })
    }

    /// The prefix used by the `n`-th invocation overall.
    pub fn prefix_for(&self, n: u64) -> &str {
        &self.prefixes[(n % self.prefixes.len() as u64) as usize]
    }

    pub fn autocompleter(&self) -> &A {
        &self.autocompleter
    }
}

impl<A: Autocompleter + 'static> Operation for SuggestOperation<A> {
    async fn execute(&self, _worker: usize) -> Result<()> {
        let n = self.invocations.fetch_add(1, Ordering::Relaxed);
        self.autocompleter.suggest(self.prefix_for(n), SUGGEST_LIMIT, self.fuzzy).await?;
        Ok(())
    }
}
