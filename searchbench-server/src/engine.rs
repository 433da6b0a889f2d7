//! In-memory search engine backing the reference server and the `memory`
//! benchmark backend.
//!
//! Documents are tokenized into an inverted index keyed by term. A query
//! matches a document when every query term matches at least one of the
//! document's terms; without `verbatim`, a query term also matches any indexed
//! term it is a prefix of. The autocomplete dictionary lives beside the index
//! and survives index drops, so a benchmark can rebuild documents without
//! reloading suggestions.

use searchbench_common::{
    tokenize, Autocompleter, BenchError, Document, IndexOptions, Query, Result, SearchIndex,
    SearchResult, Suggestion,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::timeout;

use crate::config::LOCK_TIMEOUT;

#[derive(Default)]
struct IndexState {
    documents: HashMap<String, Document>,
    /// term -> ids of documents containing it
    postings: BTreeMap<String, BTreeSet<String>>,
}

impl IndexState {
    fn insert(&mut self, doc: Document) {
        for term in document_terms(&doc) {
            self.postings.entry(term).or_default().insert(doc.id.clone());
        }
        self.documents.insert(doc.id.clone(), doc);
    }

    fn remove(&mut self, id: &str) {
        let Some(old) = self.documents.remove(id) else {
            return;
        };
        for term in document_terms(&old) {
            if let Some(ids) = self.postings.get_mut(&term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    /// Ids of documents matching a single query term.
    fn matching_ids(&self, term: &str, verbatim: bool) -> BTreeSet<String> {
        if verbatim {
            return self.postings.get(term).cloned().unwrap_or_default();
        }
        self.postings
            .range(term.to_string()..)
            .take_while(|(indexed, _)| indexed.starts_with(term))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }
}

fn document_terms(doc: &Document) -> BTreeSet<String> {
    doc.fields.values().flat_map(|v| tokenize(v)).collect()
}

/// A named in-memory index plus its autocomplete dictionary.
pub struct MemoryIndex {
    name: String,
    /// `None` until `create` is called, and again after `drop_index`.
    state: RwLock<Option<IndexState>>,
    dictionary: RwLock<BTreeMap<String, f32>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(None),
            dictionary: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents currently indexed; `None` if the index does not exist.
    pub async fn len(&self) -> Result<Option<usize>> {
        let guard = self.read_state().await?;
        Ok(guard.as_ref().map(|s| s.documents.len()))
    }

    async fn read_state(&self) -> Result<RwLockReadGuard<'_, Option<IndexState>>> {
        timeout(LOCK_TIMEOUT, self.state.read()).await.map_err(|_| BenchError::LockTimeout)
    }

    async fn write_state(&self) -> Result<RwLockWriteGuard<'_, Option<IndexState>>> {
        timeout(LOCK_TIMEOUT, self.state.write()).await.map_err(|_| BenchError::LockTimeout)
    }

    async fn read_dictionary(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, f32>>> {
        timeout(LOCK_TIMEOUT, self.dictionary.read()).await.map_err(|_| BenchError::LockTimeout)
    }

    async fn write_dictionary(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, f32>>> {
        timeout(LOCK_TIMEOUT, self.dictionary.write()).await.map_err(|_| BenchError::LockTimeout)
    }

    fn not_found(&self) -> BenchError {
        BenchError::IndexNotFound(self.name.clone())
    }
}

impl SearchIndex for MemoryIndex {
    async fn create(&self) -> Result<()> {
        let mut guard = self.write_state().await?;
        if guard.is_some() {
            return Err(BenchError::IndexExists(self.name.clone()));
        }
        *guard = Some(IndexState::default());
        Ok(())
    }

    async fn drop_index(&self) -> Result<()> {
        *self.write_state().await? = None;
        Ok(())
    }

    async fn index(&self, documents: &[Document], options: &IndexOptions) -> Result<()> {
        let mut guard = self.write_state().await?;
        let state = guard.as_mut().ok_or_else(|| self.not_found())?;

        // Validate the whole batch first so a rejected batch leaves no partial writes.
        if !options.replace {
            let mut seen = BTreeSet::new();
            for doc in documents {
                if state.documents.contains_key(&doc.id) || !seen.insert(doc.id.as_str()) {
                    return Err(BenchError::DuplicateDocument(doc.id.clone()));
                }
            }
        }

        for doc in documents {
            state.remove(&doc.id);
            state.insert(doc.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &Query) -> Result<SearchResult> {
        query.validate()?;
        let guard = self.read_state().await?;
        let state = guard.as_ref().ok_or_else(|| self.not_found())?;

        let mut matched: Option<BTreeSet<String>> = None;
        for term in tokenize(&query.text) {
            let ids = state.matching_ids(&term, query.flags.verbatim);
            matched = Some(match matched {
                None => ids,
                Some(acc) => acc.intersection(&ids).cloned().collect(),
            });
            if matched.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }

        let mut hits: Vec<&Document> = matched
            .unwrap_or_default()
            .iter()
            .filter_map(|id| state.documents.get(id))
            .collect();
        hits.sort_by(|a, b| rank(a, b));

        let total = hits.len() as u64;
        let documents = hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|d| {
                if query.flags.no_content {
                    Document::new(d.id.clone()).with_score(d.score)
                } else {
                    d.clone()
                }
            })
            .collect();

        Ok(SearchResult { documents, total })
    }
}

/// Higher score first, ties broken by id.
fn rank(a: &Document, b: &Document) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

impl Autocompleter for MemoryIndex {
    async fn add_terms(&self, terms: &[Suggestion]) -> Result<()> {
        let mut dict = self.write_dictionary().await?;
        for s in terms {
            let term = s.term.trim().to_lowercase();
            if !term.is_empty() {
                dict.insert(term, s.score);
            }
        }
        Ok(())
    }

    async fn suggest(&self, prefix: &str, limit: usize, fuzzy: bool) -> Result<Vec<Suggestion>> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let dict = self.read_dictionary().await?;

        let mut found: Vec<Suggestion> = if fuzzy {
            let width = prefix.chars().count();
            dict.iter()
                .filter(|(term, _)| {
                    let head: String = term.chars().take(width).collect();
                    within_one_edit(&head, &prefix)
                })
                .map(|(term, score)| Suggestion::new(term.clone(), *score))
                .collect()
        } else {
            dict.range(prefix.clone()..)
                .take_while(|(term, _)| term.starts_with(&prefix))
                .map(|(term, score)| Suggestion::new(term.clone(), *score))
                .collect()
        };

        found.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.term.cmp(&b.term)));
        found.truncate(limit);
        Ok(found)
    }

    async fn delete(&self) -> Result<()> {
        self.write_dictionary().await?.clear();
        Ok(())
    }
}

/// `true` when `a` and `b` differ by at most one insertion, deletion or substitution.
pub fn within_one_edit(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if long.len() - short.len() > 1 {
        return false;
    }

    let mut i = 0;
    let mut j = 0;
    let mut edits = 0;
    while i < short.len() && j < long.len() {
        if short[i] == long[j] {
            i += 1;
            j += 1;
            continue;
        }
        edits += 1;
        if edits > 1 {
            return false;
        }
        if short.len() == long.len() {
            i += 1;
        }
        j += 1;
    }
    edits + (long.len() - j) + (short.len() - i) <= 1
}
