use searchbench_common::{tokenize, BenchError, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Split a comma-separated `--queries` value. Blank entries are dropped.
pub fn parse_query_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a query pool file: one query per line, blank lines skipped.
pub async fn load_query_pool(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        BenchError::Config(format!("cannot read query file {}: {e}", path.display()))
    })?;
    let queries: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    tracing::info!(path = %path.display(), queries = queries.len(), "loaded query pool");
    Ok(queries)
}

/// Autocomplete prefixes: the first `len` characters of every query term,
/// de-duplicated and sorted. Terms shorter than `len` are used whole.
pub fn build_prefixes(queries: &[String], len: usize) -> Vec<String> {
    let len = len.max(1);
    queries
        .iter()
        .flat_map(|q| tokenize(q))
        .map(|term| term.chars().take(len).collect::<String>())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Title recorded for a search run, e.g. `search: hello world 2`.
pub fn default_title(source: &str, pool_size: usize) -> String {
    format!("search: {source} {pool_size}")
}
