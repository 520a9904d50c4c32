//! Qdrant REST store tests against a mock server.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use docvec::models::{Document, DocumentChunk, SearchQuery};
use docvec::qdrant::QdrantStore;
use docvec::repository::DocumentRepository;
use docvec::store::VectorStore;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "documents";

async fn setup() -> (MockServer, QdrantStore) {
    let server = MockServer::start().await;
    let store = QdrantStore::new(&server.uri(), COLLECTION, Duration::from_secs(5)).unwrap();
    (server, store)
}

fn repository(store: QdrantStore) -> DocumentRepository {
    DocumentRepository::new(Arc::new(store), 3)
}

fn stored_point(id: &str, file: &str, index: usize, total: usize) -> Value {
    json!({
        "id": id,
        "payload": {
            "fileName": file,
            "baseFileName": file.trim_end_matches(".pdf"),
            "chunkId": format!("{}_{}", file.trim_end_matches(".pdf"), index),
            "content": format!("chunk {} of {}", index, file),
            "fileHash": "abc123",
            "chunkIndex": index,
            "totalChunks": total,
            "processedAt": "2024-03-01T12:00:00Z"
        }
    })
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": result, "status": "ok" }))
}

#[tokio::test]
async fn test_ensure_collection_creates_missing() {
    let (server, store) = setup().await;
    Mock::given(method("GET"))
        .and(path("/collections/documents"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": { "error": "Not found: Collection `documents` doesn't exist!" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/documents"))
        .and(body_partial_json(json!({
            "vectors": { "size": 3, "distance": "Cosine" }
        })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    store.ensure_collection(3).await.unwrap();
}

#[tokio::test]
async fn test_ensure_collection_existing_is_noop() {
    let (server, store) = setup().await;
    Mock::given(method("GET"))
        .and(path("/collections/documents"))
        .respond_with(ok(json!({
            "status": "green",
            "config": { "params": { "vectors": { "size": 3, "distance": "Cosine" } } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/documents"))
        .respond_with(ok(json!(true)))
        .expect(0)
        .mount(&server)
        .await;

    store.ensure_collection(3).await.unwrap();
}

#[tokio::test]
async fn test_ensure_collection_size_mismatch() {
    let (server, store) = setup().await;
    Mock::given(method("GET"))
        .and(path("/collections/documents"))
        .respond_with(ok(json!({
            "config": { "params": { "vectors": { "size": 8, "distance": "Cosine" } } }
        })))
        .mount(&server)
        .await;

    let err = store.ensure_collection(3).await.unwrap_err();
    assert!(err.to_string().contains("vector size 8"), "{}", err);
}

#[tokio::test]
async fn test_upsert_sends_payload_and_vector() {
    let (server, store) = setup().await;
    Mock::given(method("PUT"))
        .and(path("/collections/documents/points"))
        .respond_with(ok(json!({ "operation_id": 1, "status": "completed" })))
        .expect(1)
        .mount(&server)
        .await;

    let chunk = DocumentChunk {
        text: "Pumps need priming.".into(),
        index: 0,
        of_total: 2,
    };
    let processed_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let doc = Document::from_chunk("pumps.pdf", &chunk, vec![0.5, 0.25, 0.0], "abc123", processed_at);
    repository(store).upsert(&doc).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), Some("wait=true"));
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let point = &body["points"][0];
    assert_eq!(point["id"], json!(doc.id));
    assert_eq!(point["vector"], json!([0.5, 0.25, 0.0]));
    assert_eq!(
        point["payload"],
        json!({
            "fileName": "pumps.pdf",
            "baseFileName": "pumps",
            "chunkId": "pumps_0",
            "content": "Pumps need priming.",
            "fileHash": "abc123",
            "chunkIndex": 0,
            "totalChunks": 2,
            "processedAt": "2024-03-01T12:00:00Z"
        })
    );
}

#[tokio::test]
async fn test_get_by_file_name_follows_scroll_pages() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/scroll"))
        .and(body_partial_json(json!({ "offset": "page-2" })))
        .respond_with(ok(json!({
            "points": [stored_point("id-0", "a.pdf", 0, 3)],
            "next_page_offset": null
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/scroll"))
        .and(body_partial_json(json!({
            "filter": { "must": [{ "key": "fileName", "match": { "any": ["a.pdf"] } }] },
            "with_payload": true
        })))
        .respond_with(ok(json!({
            "points": [stored_point("id-2", "a.pdf", 2, 3), stored_point("id-1", "a.pdf", 1, 3)],
            "next_page_offset": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let docs = repository(store).get_by_file_name("a.pdf").await.unwrap();
    let indices: Vec<usize> = docs.iter().map(|d| d.chunk_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(docs[0].id, "id-0");
    assert_eq!(docs[1].chunk_id, "a_1");
    assert!(docs.iter().all(|d| d.total_chunks == 3));
}

#[tokio::test]
async fn test_search_sends_filter_and_threshold() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/search"))
        .and(body_partial_json(json!({
            "vector": [1.0, 0.0, 0.0],
            "limit": 2,
            "score_threshold": 0.5,
            "with_payload": true,
            "filter": {
                "must": [
                    { "key": "fileName", "match": { "any": ["a.pdf", "b.pdf"] } },
                    { "key": "processedAt", "range": { "gte": "2024-01-01T00:00:00Z" } }
                ]
            }
        })))
        .respond_with(ok(json!([
            {
                "id": "id-1",
                "score": 0.875,
                "version": 3,
                "payload": stored_point("id-1", "a.pdf", 1, 3)["payload"]
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery::vector(vec![1.0, 0.0, 0.0])
        .with_file_name("a.pdf")
        .with_file_name("b.pdf")
        .processed_after(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .limit(2)
        .minimum_score(0.5);
    let result = repository(store).search(&query).await.unwrap();

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.total_count, 1);
    assert_eq!(result.documents[0].score, Some(0.875));
    assert_eq!(result.documents[0].file_name, "a.pdf");
    assert!(result.documents[0].vector.is_empty());
}

#[tokio::test]
async fn test_search_server_error_is_reported_in_band() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = repository(store)
        .search(&SearchQuery::vector(vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.documents.is_empty());
    let message = result.error_message.unwrap();
    assert!(message.starts_with("vector search failed"), "{}", message);
    assert!(message.contains("500"), "{}", message);
}

#[tokio::test]
async fn test_delete_by_file_name_removes_listed_ids() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/scroll"))
        .respond_with(ok(json!({
            "points": [stored_point("id-0", "a.pdf", 0, 2), stored_point("id-1", "a.pdf", 1, 2)],
            "next_page_offset": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/delete"))
        .and(body_partial_json(json!({ "points": ["id-0", "id-1"] })))
        .respond_with(ok(json!({ "status": "completed" })))
        .expect(1)
        .mount(&server)
        .await;

    let removed = repository(store).delete_by_file_name("a.pdf").await.unwrap();
    assert_eq!(removed, 2);
}

#[tokio::test]
async fn test_delete_by_unknown_file_name_sends_no_delete() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/scroll"))
        .respond_with(ok(json!({ "points": [], "next_page_offset": null })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/delete"))
        .respond_with(ok(json!({ "status": "completed" })))
        .expect(0)
        .mount(&server)
        .await;

    let removed = repository(store).delete_by_file_name("nope.pdf").await.unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_get_reads_numeric_id_and_vector() {
    let (server, store) = setup().await;
    let mut point = stored_point("ignored", "a.pdf", 0, 1);
    point["id"] = json!(7);
    point["vector"] = json!([0.5, 0.5, 0.0]);
    Mock::given(method("POST"))
        .and(path("/collections/documents/points"))
        .and(body_partial_json(json!({ "ids": ["7"], "with_vector": true })))
        .respond_with(ok(json!([point])))
        .mount(&server)
        .await;

    let doc = repository(store).get("7").await.unwrap().unwrap();
    assert_eq!(doc.id, "7");
    assert_eq!(doc.vector, vec![0.5, 0.5, 0.0]);
}

#[tokio::test]
async fn test_count_and_exists() {
    let (server, store) = setup().await;
    Mock::given(method("POST"))
        .and(path("/collections/documents/points/count"))
        .and(body_partial_json(json!({ "exact": true })))
        .respond_with(ok(json!({ "count": 42 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/documents/points/present"))
        .respond_with(ok(stored_point("present", "a.pdf", 0, 1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/documents/points/absent"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/documents/points/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let repo = repository(store);
    assert_eq!(repo.count().await.unwrap(), 42);
    assert!(repo.exists("present").await);
    assert!(!repo.exists("absent").await);
    // Store errors read as "not found".
    assert!(!repo.exists("broken").await);
}
