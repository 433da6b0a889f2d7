use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use searchbench_common::{
    BulkRequest, BulkResponse, Document, ErrorResponse, IndexOptions, Query, SearchResult,
    Suggestion,
};
use searchbench_server::{
    handle_add_suggestions, handle_bulk, handle_create, handle_delete_suggestions, handle_drop,
    handle_search, handle_suggest, AppState, Server, ServerConfig, SuggestParams,
};

// --- Test helpers ---

/// Consume a response body into bytes.
async fn response_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn response_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&response_body(response).await).unwrap()
}

fn path(name: &str) -> Path<String> {
    Path(name.to_string())
}

fn doc(id: &str, score: f32, body: &str) -> Document {
    Document::new(id).with_score(score).with_field("body", body)
}

async fn created_index(name: &str) -> AppState {
    let state = AppState::new();
    let response = handle_create(State(state.clone()), path(name)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    state
}

async fn bulk(state: &AppState, name: &str, documents: Vec<Document>) -> Response {
    handle_bulk(
        State(state.clone()),
        path(name),
        Json(BulkRequest { documents, options: IndexOptions::default() }),
    )
    .await
}

async fn search(state: &AppState, name: &str, query: Query) -> Response {
    handle_search(State(state.clone()), path(name), Json(query)).await
}

// --- create / drop ---

#[tokio::test]
async fn test_create_twice_conflicts() {
    let state = created_index("wik").await;
    let response = handle_create(State(state.clone()), path("wik")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = response_json(response).await;
    assert_eq!(body.error, "Index already exists: wik");
}

#[tokio::test]
async fn test_drop_unknown_index_is_no_content() {
    let state = AppState::new();
    let response = handle_drop(State(state), path("missing")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_drop_then_create_starts_empty() {
    let state = created_index("wik").await;
    assert_eq!(bulk(&state, "wik", vec![doc("1", 1.0, "hello")]).await.status(), StatusCode::OK);

    assert_eq!(handle_drop(State(state.clone()), path("wik")).await.status(), StatusCode::NO_CONTENT);
    // Search on a dropped index reports it missing.
    assert_eq!(search(&state, "wik", Query::new("hello")).await.status(), StatusCode::NOT_FOUND);

    assert_eq!(handle_create(State(state.clone()), path("wik")).await.status(), StatusCode::CREATED);
    let result: SearchResult = response_json(search(&state, "wik", Query::new("hello")).await).await;
    assert_eq!(result.total, 0);
}

// --- bulk / search ---

#[tokio::test]
async fn test_bulk_into_unknown_index_is_not_found() {
    let state = AppState::new();
    let response = bulk(&state, "missing", vec![doc("1", 1.0, "hello")]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_reports_indexed_count() {
    let state = created_index("wik").await;
    let response = bulk(&state, "wik", vec![doc("1", 1.0, "a"), doc("2", 1.0, "b")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: BulkResponse = response_json(response).await;
    assert_eq!(body.indexed, 2);
}

#[tokio::test]
async fn test_bulk_duplicate_conflicts() {
    let state = created_index("wik").await;
    bulk(&state, "wik", vec![doc("1", 1.0, "a")]).await;
    let response = bulk(&state, "wik", vec![doc("1", 1.0, "b")]).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_search_returns_ranked_page() {
    let state = created_index("wik").await;
    bulk(
        &state,
        "wik",
        vec![
            doc("1", 0.2, "hello world"),
            doc("2", 0.9, "hello there world"),
            doc("3", 0.5, "goodbye world"),
        ],
    )
    .await;

    let response = search(&state, "wik", Query::new("hello world").limit(0, 1)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: SearchResult = response_json(response).await;
    assert_eq!(result.total, 2);
    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].id, "2");
}

#[tokio::test]
async fn test_search_invalid_query_is_bad_request() {
    let state = created_index("wik").await;
    let response = search(&state, "wik", Query::new("  ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- suggestions ---

#[tokio::test]
async fn test_suggest_round_trip() {
    let state = AppState::new();
    let response = handle_add_suggestions(
        State(state.clone()),
        path("ac"),
        Json(vec![Suggestion::new("hello", 2.0), Suggestion::new("help", 3.0), Suggestion::new("world", 1.0)]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let params = SuggestParams { prefix: "hel".to_string(), limit: 5, fuzzy: false };
    let response = handle_suggest(State(state.clone()), path("ac"), QueryParams(params)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let found: Vec<Suggestion> = response_json(response).await;
    let terms: Vec<&str> = found.iter().map(|s| s.term.as_str()).collect();
    assert_eq!(terms, vec!["help", "hello"]);

    let response = handle_delete_suggestions(State(state.clone()), path("ac")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let params = SuggestParams { prefix: "hel".to_string(), limit: 5, fuzzy: false };
    let found: Vec<Suggestion> =
        response_json(handle_suggest(State(state), path("ac"), QueryParams(params)).await).await;
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_suggest_unknown_dictionary_is_not_found() {
    let state = AppState::new();
    let params = SuggestParams { prefix: "he".to_string(), limit: 5, fuzzy: true };
    let response = handle_suggest(State(state), path("ac"), QueryParams(params)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- server ---

#[test]
fn test_server_address() {
    let server = Server::new(ServerConfig { address: "127.0.0.1:7700".parse().unwrap() });
    assert_eq!(server.address().port(), 7700);
}
