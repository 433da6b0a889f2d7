//! Bulk loading of documents into a backend.
//!
//! Producers (a line-oriented file reader or the synthetic generator) feed a
//! bounded channel; `ingest_documents` drains it and indexes in fixed-size
//! chunks, so reading and indexing overlap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use searchbench_common::{
    tokenize, Autocompleter, BenchError, Document, IndexOptions, Result, SearchIndex, Suggestion,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Documents per bulk call unless overridden.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Fields whose terms feed the autocomplete dictionary.
const SUGGEST_FIELDS: [&str; 2] = ["title", "body"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: u64,
    pub chunks: u64,
    /// Field names plus values, the payload volume used for the data rate.
    pub bytes: u64,
    /// Distinct terms added to the autocomplete dictionary.
    pub terms: usize,
}

/// Parse one input line. JSON objects are read as a `Document`; any other
/// text becomes the `body` of a document whose id is the line number.
/// Blank lines yield `None`.
pub fn parse_document(line_no: usize, line: &str) -> Result<Option<Document>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(Some)
            .map_err(|e| BenchError::Io(format!("line {line_no}: invalid document: {e}")));
    }
    Ok(Some(Document::new(line_no.to_string()).with_field("body", line)))
}

/// Stream documents from a file, one per line, into a channel. The handle
/// resolves to the number of documents sent, or the first read/parse error.
pub fn spawn_file_reader(
    path: PathBuf,
    buffer: usize,
) -> (mpsc::Receiver<Document>, JoinHandle<Result<u64>>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let handle = tokio::spawn(async move {
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            BenchError::Io(format!("cannot open {}: {e}", path.display()))
        })?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;
        let mut sent = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let Some(doc) = parse_document(line_no, &line)? else {
                continue;
            };
            if tx.send(doc).await.is_err() {
                // Consumer gave up; nothing more to do.
                break;
            }
            sent += 1;
        }
        Ok::<_, BenchError>(sent)
    });
    (rx, handle)
}

fn document_bytes(doc: &Document) -> u64 {
    doc.fields.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
}

/// Index everything `rx` yields in chunks of `chunk_size`, flushing the final
/// partial chunk. With an autocompleter, the distinct terms of the title and
/// body fields are added afterwards, scored by how often they occurred.
pub async fn ingest_documents<I, A>(
    rx: &mut mpsc::Receiver<Document>,
    index: &I,
    autocompleter: Option<&A>,
    options: IndexOptions,
    chunk_size: usize,
) -> Result<IngestStats>
where
    I: SearchIndex,
    A: Autocompleter,
{
    let chunk_size = chunk_size.max(1);
    let mut stats = IngestStats::default();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut frequencies: BTreeMap<String, f32> = BTreeMap::new();

    let mut window_start = Instant::now();
    let mut window_docs = 0u64;
    let mut window_bytes = 0u64;

    while let Some(doc) = rx.recv().await {
        let bytes = document_bytes(&doc);
        stats.bytes += bytes;
        window_bytes += bytes;
        window_docs += 1;
        if autocompleter.is_some() {
            for field in SUGGEST_FIELDS {
                if let Some(text) = doc.fields.get(field) {
                    for term in tokenize(text) {
                        *frequencies.entry(term).or_insert(0.0) += 1.0;
                    }
                }
            }
        }
        chunk.push(doc);

        if chunk.len() == chunk_size {
            index.index(&chunk, &options).await?;
            stats.documents += chunk.len() as u64;
            stats.chunks += 1;
            chunk.clear();

            let secs = window_start.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                documents = stats.documents,
                docs_per_sec = %format!("{:.1}", window_docs as f64 / secs),
                mb_per_sec = %format!("{:.2}", window_bytes as f64 / secs / BYTES_PER_MB),
                "indexed chunk"
            );
            window_start = Instant::now();
            window_docs = 0;
            window_bytes = 0;
        }
    }

    if !chunk.is_empty() {
        index.index(&chunk, &options).await?;
        stats.documents += chunk.len() as u64;
        stats.chunks += 1;
    }

    if let Some(ac) = autocompleter {
        let terms: Vec<Suggestion> = frequencies
            .into_iter()
            .map(|(term, score)| Suggestion::new(term, score))
            .collect();
        if !terms.is_empty() {
            ac.add_terms(&terms).await?;
        }
        stats.terms = terms.len();
    }

    tracing::info!(
        documents = stats.documents,
        chunks = stats.chunks,
        terms = stats.terms,
        "ingest finished"
    );
    Ok(stats)
}

/// Random documents over a vocabulary of `term0..term{N-1}`.
pub struct DocumentGenerator {
    vocabulary: usize,
    /// field name -> inclusive (min, max) word count
    fields: BTreeMap<String, (usize, usize)>,
    rng: StdRng,
    next_id: u64,
}

impl DocumentGenerator {
    /// Title of 5 to 10 words and body of 10 to 20 words.
    pub fn new(vocabulary: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fields = BTreeMap::from([
            ("title".to_string(), (5, 10)),
            ("body".to_string(), (10, 20)),
        ]);
        Self { vocabulary: vocabulary.max(1), fields, rng, next_id: 0 }
    }

    /// Replace the field layout.
    pub fn with_fields(mut self, fields: BTreeMap<String, (usize, usize)>) -> Self {
        self.fields = fields;
        self
    }

    pub fn generate(&mut self) -> Document {
        let mut doc = Document::new(format!("doc{}", self.next_id));
        self.next_id += 1;
        for (name, &(min, max)) in &self.fields {
            let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
            let words = self.rng.gen_range(lo..=hi);
            let text: Vec<String> = (0..words)
                .map(|_| format!("term{}", self.rng.gen_range(0..self.vocabulary)))
                .collect();
            doc.fields.insert(name.clone(), text.join(" "));
        }
        doc
    }
}

/// Produce `count` generated documents into a channel.
pub fn spawn_generator(
    mut generator: DocumentGenerator,
    count: u64,
    buffer: usize,
) -> mpsc::Receiver<Document> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(async move {
        for _ in 0..count {
            if tx.send(generator.generate()).await.is_err() {
                break;
            }
        }
    });
    rx
}
