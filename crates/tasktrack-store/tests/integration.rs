//! Integration tests for tasktrack-store
//!
//! Exercises the public tracker API against a real directory.

use std::sync::Arc;

use tasktrack_embed::{CancellationToken, MockEmbedder};
use tasktrack_store::{
    DONE_DIR, ErrorKind, FileTracker, RankParams, Task, Tracker, TrackerConfig,
};
use tempfile::tempdir;

async fn open_tracker(dir: &std::path::Path, embedder: MockEmbedder) -> FileTracker {
    FileTracker::open(dir, Arc::new(embedder), TrackerConfig::new())
        .await
        .expect("Should open tracker")
}

/// Set followed by Get returns what was stored, for both statuses.
#[tokio::test]
async fn set_get_round_trip() {
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), MockEmbedder::new(16)).await;
    let cancel = CancellationToken::new();

    let cases = [
        ("plan", "Plan sprint", "Collect open issues", false),
        ("ship", "Ship release", "Tag and publish: v1.2", true),
        ("unicode", "Überprüfen", "Grüße, 日本語 und \"quotes\"", false),
    ];

    for (id, title, description, done) in cases {
        tracker
            .set(id, Task::new(id, title, description).with_done(done), &cancel)
            .await
            .unwrap();

        let task = tracker.get(id, &cancel).await.unwrap();
        assert_eq!(task.title, title);
        assert_eq!(task.description, description);
        assert_eq!(task.done, done);
    }
}

/// Flipping the done flag moves the file and never duplicates the task.
#[tokio::test]
async fn status_transition_relocates_file() {
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), MockEmbedder::new(16)).await;
    let cancel = CancellationToken::new();

    let task = Task::new("t", "Write tests", "Cover relocation");
    tracker.set("t", task.clone(), &cancel).await.unwrap();
    assert!(dir.path().join("t.yaml").is_file());

    tracker
        .set("t", task.clone().with_done(true), &cancel)
        .await
        .unwrap();
    assert!(!dir.path().join("t.yaml").exists());
    assert!(dir.path().join(DONE_DIR).join("t.yaml").is_file());
    assert!(tracker.get("t", &cancel).await.unwrap().done);

    let listed = tracker.list(None, &cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].done);

    tracker.set("t", task, &cancel).await.unwrap();
    assert!(dir.path().join("t.yaml").is_file());
    assert!(!dir.path().join(DONE_DIR).join("t.yaml").exists());
}

/// The persisted file never carries the status.
#[tokio::test]
async fn stored_file_has_no_status_field() {
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), MockEmbedder::new(4)).await;
    let cancel = CancellationToken::new();

    tracker
        .set("x", Task::new("x", "Title", "Body").with_done(true), &cancel)
        .await
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join(DONE_DIR).join("x.yaml")).unwrap();
    let value: serde_yaml::Mapping = serde_yaml::from_str(&content).unwrap();
    let keys: Vec<_> = value.keys().filter_map(|k| k.as_str()).collect();
    assert_eq!(keys.len(), 4);
    for key in ["id", "title", "description", "vector"] {
        assert!(keys.contains(&key), "missing {key}");
    }
}

/// Deleting is idempotent and makes the task unreachable.
#[tokio::test]
async fn delete_is_idempotent() {
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), MockEmbedder::new(4)).await;
    let cancel = CancellationToken::new();

    tracker.del("ghost", &cancel).await.unwrap();

    tracker
        .set("d", Task::new("d", "Doomed", "Soon gone").with_done(true), &cancel)
        .await
        .unwrap();
    tracker.del("d", &cancel).await.unwrap();
    tracker.del("d", &cancel).await.unwrap();

    let err = tracker.get("d", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(tracker.list(None, &cancel).await.unwrap().is_empty());
}

/// Search returns bounded, ordered, thresholded results.
#[tokio::test]
async fn search_ranking_properties() {
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), MockEmbedder::new(32)).await;
    let cancel = CancellationToken::new();

    let titles = [
        "Fix login timeout",
        "Fix logout button",
        "Write release notes",
        "Refactor login session handling",
        "Update dependencies",
        "Add login rate limiting",
        "Document storage layout",
        "Benchmark search",
        "Clean up logs",
        "Rotate credentials",
        "Review login flow",
        "Triage issues",
    ];
    for (i, title) in titles.iter().enumerate() {
        let id = format!("task-{i:02}");
        tracker
            .set(&id, Task::new(&id, *title, format!("Details for {title}")), &cancel)
            .await
            .unwrap();
    }

    let results = tracker.search("login", &cancel).await.unwrap();
    let params = RankParams::default();

    assert!(results.len() <= params.limit);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for result in &results {
        assert!(result.score > params.threshold);
        assert!(result.score <= 1.0);
    }
}

/// The worked example: distances 0, 5 and 10 give scores 1, 0.5 and 0.
#[tokio::test]
async fn search_reference_example() {
    let embedder = MockEmbedder::new(2)
        .with_vector("find it", vec![0.0, 0.0])
        .with_vector("# A\n\nexact", vec![0.0, 0.0])
        .with_vector("# B\n\nhalfway", vec![3.0, 4.0])
        .with_vector("# C\n\nfar", vec![6.0, 8.0]);
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), embedder).await;
    let cancel = CancellationToken::new();

    tracker
        .set("c", Task::new("c", "C", "far"), &cancel)
        .await
        .unwrap();
    tracker
        .set("a", Task::new("a", "A", "exact"), &cancel)
        .await
        .unwrap();
    tracker
        .set("b", Task::new("b", "B", "halfway").with_done(true), &cancel)
        .await
        .unwrap();

    let results = tracker.search("find it", &cancel).await.unwrap();
    let scored: Vec<_> = results
        .iter()
        .map(|r| (r.task.id.as_str(), r.score, r.task.done))
        .collect();
    assert_eq!(scored, vec![("a", 1.0, false), ("b", 0.5, true)]);
}

/// A corpus identical to the query has nothing to normalize against.
#[tokio::test]
async fn search_degenerate_corpus_is_empty() {
    let embedder = MockEmbedder::new(2)
        .with_vector("q", vec![1.0, 1.0])
        .with_vector("# One\n\nsame", vec![1.0, 1.0])
        .with_vector("# Two\n\nsame", vec![1.0, 1.0]);
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), embedder).await;
    let cancel = CancellationToken::new();

    tracker
        .set("1", Task::new("1", "One", "same"), &cancel)
        .await
        .unwrap();
    tracker
        .set("2", Task::new("2", "Two", "same"), &cancel)
        .await
        .unwrap();

    assert!(tracker.search("q", &cancel).await.unwrap().is_empty());
}

/// Mixed dimensionality in the corpus fails the search instead of truncating.
#[tokio::test]
async fn search_dimension_mismatch_is_validation_error() {
    let embedder = MockEmbedder::new(3).with_vector("# Odd\n\nshort vector", vec![1.0, 2.0]);
    let dir = tempdir().unwrap();
    let tracker = open_tracker(dir.path(), embedder).await;
    let cancel = CancellationToken::new();

    tracker
        .set("odd", Task::new("odd", "Odd", "short vector"), &cancel)
        .await
        .unwrap();
    tracker
        .set("ok", Task::new("ok", "Fine", "three dims"), &cancel)
        .await
        .unwrap();

    let err = tracker.search("anything", &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.root().to_string().contains("odd"));
}

/// Concurrent status flips on one id never leave the task in both places.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_status_flips_stay_consistent() {
    let dir = tempdir().unwrap();
    let tracker = Arc::new(open_tracker(dir.path(), MockEmbedder::new(8)).await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            let task = Task::new("race", "Racing", format!("round {i}")).with_done(i % 2 == 0);
            tracker
                .set("race", task, &CancellationToken::new())
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let active = dir.path().join("race.yaml").exists();
    let done = dir.path().join(DONE_DIR).join("race.yaml").exists();
    assert!(active ^ done, "task must live in exactly one location");

    let cancel = CancellationToken::new();
    let listed = tracker.list(None, &cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(tracker.get("race", &cancel).await.unwrap().done, done);
}

/// Listing while another caller flips a task's status always sees it once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn list_during_status_flips_sees_task_once() {
    let dir = tempdir().unwrap();
    let tracker = Arc::new(open_tracker(dir.path(), MockEmbedder::new(8)).await);
    let cancel = CancellationToken::new();

    let task = Task::new("flip", "Flip", "Back and forth");
    tracker.set("flip", task.clone(), &cancel).await.unwrap();

    let flipper = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            for i in 0..300 {
                tracker
                    .set("flip", task.clone().with_done(i % 2 == 0), &cancel)
                    .await
                    .unwrap();
            }
        })
    };

    let mut lists = 0;
    loop {
        let listed = tracker.list(None, &cancel).await.unwrap();
        assert_eq!(listed.len(), 1, "list #{lists} lost or duplicated the task");
        assert_eq!(listed[0].id, "flip");
        lists += 1;
        if flipper.is_finished() {
            break;
        }
    }
    flipper.await.unwrap();
}
