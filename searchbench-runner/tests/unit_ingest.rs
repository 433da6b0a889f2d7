use searchbench_common::{
    Autocompleter, BenchError, Document, IndexOptions, Query, Result, SearchIndex, SearchResult,
    Suggestion,
};
use searchbench_runner::ingest::{
    ingest_documents, parse_document, spawn_file_reader, spawn_generator, DocumentGenerator,
};
use searchbench_server::engine::MemoryIndex;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Records the size of every bulk call.
#[derive(Default)]
struct ChunkRecorder {
    chunks: Mutex<Vec<usize>>,
}

impl ChunkRecorder {
    fn chunks(&self) -> Vec<usize> {
        self.chunks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl SearchIndex for ChunkRecorder {
    async fn create(&self) -> Result<()> {
        Ok(())
    }

    async fn drop_index(&self) -> Result<()> {
        Ok(())
    }

    async fn index(&self, documents: &[Document], _options: &IndexOptions) -> Result<()> {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(documents.len());
        }
        Ok(())
    }

    async fn search(&self, _query: &Query) -> Result<SearchResult> {
        Ok(SearchResult::default())
    }
}

async fn channel_of(docs: Vec<Document>) -> mpsc::Receiver<Document> {
    let (tx, rx) = mpsc::channel(docs.len().max(1));
    for doc in docs {
        tx.send(doc).await.expect("send");
    }
    rx
}

fn numbered(n: usize) -> Vec<Document> {
    (0..n).map(|i| Document::new(i.to_string()).with_field("body", "x")).collect()
}

#[test]
fn test_parse_document_formats() {
    assert_eq!(parse_document(1, "   ").expect("blank"), None);

    let plain = parse_document(7, "Hello there").expect("plain").expect("document");
    assert_eq!(plain.id, "7");
    assert_eq!(plain.fields.get("body").map(String::as_str), Some("Hello there"));

    let json = parse_document(2, r#"{"id":"a1","score":0.5,"fields":{"title":"T"}}"#)
        .expect("json")
        .expect("document");
    assert_eq!(json.id, "a1");
    assert_eq!(json.score, 0.5);
    assert_eq!(json.fields.get("title").map(String::as_str), Some("T"));

    assert!(matches!(parse_document(3, "{not json"), Err(BenchError::Io(_))));
}

#[tokio::test]
async fn test_ingest_flushes_partial_chunk() {
    let index = ChunkRecorder::default();
    let mut rx = channel_of(numbered(25)).await;
    let stats = ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 10)
        .await
        .expect("ingest failed");

    assert_eq!(index.chunks(), vec![10, 10, 5]);
    assert_eq!(stats.documents, 25);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.terms, 0);
}

#[tokio::test]
async fn test_ingest_exact_multiple_has_no_empty_chunk() {
    let index = ChunkRecorder::default();
    let mut rx = channel_of(numbered(20)).await;
    ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 10)
        .await
        .expect("ingest failed");
    assert_eq!(index.chunks(), vec![10, 10]);
}

#[tokio::test]
async fn test_ingest_adds_term_frequencies() {
    let index = MemoryIndex::new("wik");
    index.create().await.expect("create");
    let docs = vec![
        Document::new("1").with_field("title", "Rust").with_field("body", "rust search"),
        Document::new("2").with_field("body", "search engine").with_field("url", "ignored"),
    ];
    let mut rx = channel_of(docs).await;
    let stats = ingest_documents(&mut rx, &index, Some(&index), IndexOptions::default(), 1)
        .await
        .expect("ingest failed");

    assert_eq!(stats.documents, 2);
    assert_eq!(stats.terms, 3);
    let found = index.suggest("rus", 5, false).await.expect("suggest");
    assert_eq!(found, vec![Suggestion::new("rust", 2.0)]);
    let found = index.suggest("se", 5, false).await.expect("suggest");
    assert_eq!(found, vec![Suggestion::new("search", 2.0)]);
    assert!(index.suggest("ign", 5, false).await.expect("suggest").is_empty());
    assert_eq!(index.len().await.expect("len"), Some(2));
}

#[tokio::test]
async fn test_ingest_stops_on_backend_error() {
    // Never created: the first bulk call fails.
    let index = MemoryIndex::new("wik");
    let mut rx = channel_of(numbered(5)).await;
    let result = ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 2).await;
    assert_eq!(result, Err(BenchError::IndexNotFound("wik".to_string())));
}

#[tokio::test]
async fn test_file_reader_streams_documents() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "first abstract").expect("write");
    writeln!(file).expect("write");
    writeln!(file, r#"{{"id":"doc-x","fields":{{"body":"json body"}}}}"#).expect("write");

    let (mut rx, reader) = spawn_file_reader(file.path().to_path_buf(), 4);
    let index = ChunkRecorder::default();
    let stats = ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 10)
        .await
        .expect("ingest failed");

    assert_eq!(reader.await.expect("join"), Ok(2));
    assert_eq!(stats.documents, 2);
    assert_eq!(index.chunks(), vec![2]);
}

#[tokio::test]
async fn test_file_reader_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "good line").expect("write");
    writeln!(file, "{{broken").expect("write");

    let (mut rx, reader) = spawn_file_reader(file.path().to_path_buf(), 4);
    let index = ChunkRecorder::default();
    ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 10)
        .await
        .expect("ingest failed");
    assert!(matches!(reader.await.expect("join"), Err(BenchError::Io(_))));
}

#[test]
fn test_generator_shapes_documents() {
    let mut generator = DocumentGenerator::new(50, Some(42));
    for i in 0..100 {
        let doc = generator.generate();
        assert_eq!(doc.id, format!("doc{i}"));
        let title: Vec<&str> = doc.fields["title"].split(' ').collect();
        let body: Vec<&str> = doc.fields["body"].split(' ').collect();
        assert!((5..=10).contains(&title.len()), "title has {} words", title.len());
        assert!((10..=20).contains(&body.len()), "body has {} words", body.len());
        for word in title.iter().chain(body.iter()) {
            let n: usize = word.trim_start_matches("term").parse().expect("term number");
            assert!(n < 50);
        }
    }
}

#[test]
fn test_generator_is_reproducible_with_seed() {
    let mut a = DocumentGenerator::new(1000, Some(7));
    let mut b = DocumentGenerator::new(1000, Some(7));
    for _ in 0..10 {
        assert_eq!(a.generate(), b.generate());
    }
}

#[test]
fn test_generator_custom_fields() {
    let fields = BTreeMap::from([("name".to_string(), (2, 2))]);
    let mut generator = DocumentGenerator::new(3, Some(1)).with_fields(fields);
    let doc = generator.generate();
    assert_eq!(doc.fields.len(), 1);
    assert_eq!(doc.fields["name"].split(' ').count(), 2);
}

#[tokio::test]
async fn test_generator_channel_yields_count() {
    let mut rx = spawn_generator(DocumentGenerator::new(10, Some(3)), 2_500, 100);
    let index = ChunkRecorder::default();
    let stats = ingest_documents(&mut rx, &index, None::<&MemoryIndex>, IndexOptions::default(), 1_000)
        .await
        .expect("ingest failed");
    assert_eq!(stats.documents, 2_500);
    assert_eq!(index.chunks(), vec![1_000, 1_000, 500]);
}
