//! Cross-crate integration and E2E tests
//!
//! These tests run the file tracker against the real Ollama client talking
//! to a local stand-in server, covering the full set/search path over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::post};
use tasktrack_embed::{CancellationToken, OllamaConfig, OllamaEmbedder};
use tasktrack_store::{DONE_DIR, ErrorKind, FileTracker, Task, Tracker, TrackerConfig};
use tempfile::tempdir;

const MODEL: &str = "test-embed";

/// Keywords mapped to vector components by the stand-in server.
const KEYWORDS: &[&str] = &["login", "release", "docs"];

/// Embed text as keyword presence, the way a tiny model might.
fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
        .collect()
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// An `/api/embed` endpoint producing keyword vectors and counting calls.
async fn spawn_keyword_server(calls: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new().route(
        "/api/embed",
        post(move |Json(body): Json<serde_json::Value>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if body["model"] != MODEL {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(serde_json::json!({ "error": "model not found" })),
                    );
                }
                let input = body["input"].as_str().unwrap_or_default();
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "model": MODEL,
                        "embeddings": [keyword_vector(input)]
                    })),
                )
            }
        }),
    );
    spawn_server(app).await
}

fn ollama_for(addr: SocketAddr) -> OllamaEmbedder {
    let config = OllamaConfig::new()
        .with_base_url(format!("http://{}", addr))
        .with_model(MODEL)
        .with_max_retries(0)
        .with_timeout(Duration::from_secs(5));
    OllamaEmbedder::new(config).expect("Should build Ollama embedder")
}

/// E2E Test: tasks embedded over HTTP, then searched by meaning.
#[tokio::test]
async fn test_e2e_set_and_search_over_http() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_keyword_server(Arc::clone(&calls)).await;
    let dir = tempdir().unwrap();
    let tracker = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new(),
    )
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    let tasks = [
        ("login", "Fix login", "Sessions expire too early", false),
        ("release", "Cut release", "Tag the build", false),
        ("docs", "Write docs", "Describe the API", true),
        ("both", "Login docs", "Explain the sign-in page", false),
    ];
    for (id, title, description, done) in tasks {
        tracker
            .set(id, Task::new(id, title, description).with_done(done), &cancel)
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Query [1,0,0]: login at 0, both at 1, release and docs at sqrt(2).
    let results = tracker.search("login problems", &cancel).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let ids: Vec<_> = results.iter().map(|r| r.task.id.as_str()).collect();
    assert_eq!(ids, vec!["login", "both"]);
    assert_eq!(results[0].score, 1.0);
    assert!((results[1].score - (1.0 - 1.0 / 2.0_f32.sqrt())).abs() < 1e-6);

    // Status and vectors survive a reopen with a fresh client.
    let reopened = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new(),
    )
    .await
    .unwrap();
    assert!(reopened.get("docs", &cancel).await.unwrap().done);
    assert_eq!(reopened.list(Some(false), &cancel).await.unwrap().len(), 3);
}

/// Reads never call the embedding provider.
#[tokio::test]
async fn test_reads_do_not_embed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_keyword_server(Arc::clone(&calls)).await;
    let dir = tempdir().unwrap();
    let tracker = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new(),
    )
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    tracker
        .set("a", Task::new("a", "Release", "notes"), &cancel)
        .await
        .unwrap();
    tracker.get("a", &cancel).await.unwrap();
    tracker.list(None, &cancel).await.unwrap();
    tracker.del("a", &cancel).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A provider error leaves the existing record untouched.
#[tokio::test]
async fn test_provider_failure_preserves_existing_record() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = spawn_keyword_server(Arc::clone(&calls)).await;
    let dir = tempdir().unwrap();
    let cancel = CancellationToken::new();

    let good = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new(),
    )
    .await
    .unwrap();
    good.set("t", Task::new("t", "Original", "kept"), &cancel)
        .await
        .unwrap();

    // Same server, wrong model: the server answers 404.
    let wrong_model = OllamaEmbedder::new(
        OllamaConfig::new()
            .with_base_url(format!("http://{}", addr))
            .with_model("missing-model")
            .with_max_retries(0),
    )
    .unwrap();
    let broken = FileTracker::open(dir.path(), Arc::new(wrong_model), TrackerConfig::new())
        .await
        .unwrap();

    let err = broken
        .set("t", Task::new("t", "Replaced", "lost").with_done(true), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(err.root().to_string().contains("404"));

    let task = good.get("t", &cancel).await.unwrap();
    assert_eq!(task.title, "Original");
    assert!(!task.done);
    assert!(!dir.path().join(DONE_DIR).join("t.yaml").exists());
}

/// Cancelling a slow embedding aborts the write.
#[tokio::test]
async fn test_cancel_during_slow_embedding() {
    let app = Router::new().route(
        "/api/embed",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(serde_json::json!({ "embeddings": [[1.0, 2.0]] }))
        }),
    );
    let addr = spawn_server(app).await;
    let dir = tempdir().unwrap();
    let tracker = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new(),
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tracker
        .set("slow", Task::new("slow", "Slow", "embedding"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(!dir.path().join("slow.yaml").exists());
}

/// The tracker-level deadline bounds a hung provider.
#[tokio::test]
async fn test_embed_timeout_bounds_search() {
    let app = Router::new().route(
        "/api/embed",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(serde_json::json!({ "embeddings": [[1.0]] }))
        }),
    );
    let addr = spawn_server(app).await;
    let dir = tempdir().unwrap();
    let tracker = FileTracker::open(
        dir.path(),
        Arc::new(ollama_for(addr)),
        TrackerConfig::new().with_embed_timeout(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    let started = std::time::Instant::now();
    let err = tracker
        .search("anything", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert!(started.elapsed() < Duration::from_secs(5));
}
