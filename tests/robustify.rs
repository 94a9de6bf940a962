//! Robustify pipeline against a stub archive server: real HTTP client,
//! response classification, completion-order streaming, cancellation and
//! persistence.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use pdf_links::archive::RobustLinksClient;
use pdf_links::config::ArchiveConfig;
use pdf_links::models::DocumentId;
use pdf_links::robustify::RobustifyPipeline;
use pdf_links::store::{InMemoryStore, Store};

/// Requests seen by the stub: (url, anchor_text, accept).
type Seen = Arc<Mutex<Vec<(String, String, String)>>>;

/// Behaviour is chosen by substrings of the submitted `url`:
/// `friendly` → friendly error, `slow` → longer than the client timeout,
/// `html` → non-JSON body, `delay` → 150ms then success, else success.
async fn stub_api(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let url = params.get("url").cloned().unwrap_or_default();
    let anchor = params.get("anchor_text").cloned().unwrap_or_default();
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push((url.clone(), anchor, accept));

    if url.contains("friendly") {
        let body = serde_json::json!({ "friendly error": "Unable to archive this URI." });
        return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
    }
    if url.contains("slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if url.contains("html") {
        return (StatusCode::BAD_GATEWAY, "<html>upstream down</html>").into_response();
    }
    if url.contains("delay") {
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    let body = serde_json::json!({
        "robust_links_html": {
            "original_url_as_href": format!("<a href=\"{}\"\n   data-versionurl=\"https://web.archive.org/x\">{}</a>\n", url, url),
            "memento_url_as_href": format!("<a href=\"https://web.archive.org/x\">{}</a>", url),
        }
    });
    axum::Json(body).into_response()
}

async fn spawn_stub() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/", get(stub_api))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn pipeline(addr: SocketAddr, concurrency: usize) -> (Arc<InMemoryStore>, RobustifyPipeline) {
    let client = RobustLinksClient::new(&ArchiveConfig {
        endpoint: format!("http://{}/api/", addr),
        concurrency,
        timeout_secs: 1,
    })
    .unwrap();
    let store = Arc::new(InMemoryStore::new());
    let pipeline = RobustifyPipeline::new(Arc::new(client), store.clone(), concurrency);
    (store, pipeline)
}

fn doc_id() -> DocumentId {
    DocumentId::from_bytes(b"%PDF-1.4 robustify test")
}

#[tokio::test]
async fn test_mixed_batch_streams_every_outcome() {
    let (addr, seen) = spawn_stub().await;
    let (store, pipeline) = pipeline(addr, 5);

    let uris = [
        "https://ok-one.example.com/a",
        "https://friendly-one.example.com",
        "https://slow.example.com/page",
        "https://friendly-two.example.com",
        "https://ok-two.example.com/b",
    ];
    let mut stream = pipeline.start(doc_id(), uris);
    let mut lines = Vec::new();
    while let Some(entry) = stream.next().await {
        lines.push(entry);
    }
    let mapping = stream.finish().await.unwrap();

    assert_eq!(lines.len(), 5);
    // The timed-out call finishes last.
    assert_eq!(lines[4].uri, "https://slow.example.com/page");

    assert_eq!(mapping.len(), 5);
    assert_eq!(mapping.values().filter(|e| e.ok).count(), 2);

    let friendly = &mapping["https://friendly-one.example.com"];
    assert!(!friendly.ok);
    assert_eq!(
        friendly.error.as_deref(),
        Some("Unable to archive this URI. (HTTP 500)")
    );
    assert_eq!(
        mapping["https://slow.example.com/page"].error.as_deref(),
        Some("transport failure for https://slow.example.com/page")
    );

    let ok = &mapping["https://ok-one.example.com/a"];
    let original = ok.original_href.as_deref().unwrap();
    assert!(!original.contains('\n'));
    assert!(original.starts_with("<a href=\"https://ok-one.example.com/a\""));
    assert!(ok.archived_href.as_deref().unwrap().contains("web.archive.org"));

    assert_eq!(store.load_mapping(&doc_id()).await.unwrap().unwrap(), mapping);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    for (url, anchor, accept) in seen.iter() {
        assert_eq!(url, anchor);
        assert_eq!(accept, "application/json");
    }
}

#[tokio::test]
async fn test_non_json_response() {
    let (addr, _) = spawn_stub().await;
    let (_, pipeline) = pipeline(addr, 2);
    let mapping = pipeline
        .run(doc_id(), ["https://html.example.com"])
        .await
        .unwrap();
    assert_eq!(
        mapping["https://html.example.com"].error.as_deref(),
        Some("non-JSON response (HTTP 502) for https://html.example.com")
    );
}

#[tokio::test]
async fn test_cancel_after_two_results_persists_them() {
    let (addr, seen) = spawn_stub().await;
    let (store, pipeline) = pipeline(addr, 1);

    let uris: Vec<String> = (0..5)
        .map(|i| format!("https://delay-{}.example.com", i))
        .collect();
    let mut stream = pipeline.start(doc_id(), uris);
    let first = stream.next().await.unwrap();
    let second = stream.next().await.unwrap();
    drop(stream);

    let mut persisted = None;
    for _ in 0..100 {
        if let Some(mapping) = store.load_mapping(&doc_id()).await.unwrap() {
            persisted = Some(mapping);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mapping = persisted.expect("mapping persisted after cancellation");
    assert!(mapping.len() >= 2);
    assert!(mapping.len() < 5);
    assert!(mapping.contains_key(&first.uri));
    assert!(mapping.contains_key(&second.uri));
    assert!(seen.lock().unwrap().len() < 5);
}
