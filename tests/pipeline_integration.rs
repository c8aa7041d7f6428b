//! Integration tests for the download pipeline.
//!
//! These drive the real queue, stores, and HTTP clients against
//! wiremock servers and temp directories.

use std::sync::Arc;
use std::time::Duration;

use skinvault::catalog::CatalogClient;
use skinvault::db::Database;
use skinvault::discovery::Discovery;
use skinvault::queue::{
    Admission, AdmissionFilter, PushOutcome, QueueConfig, RejectReason, TaskEvent, TaskQueue,
    TexturePrefix,
};
use skinvault::store::{ContentStore, MetadataStore};
use skinvault::texture::TextureClient;
use skinvault::SkinDescriptor;
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Queue parameters tuned for fast tests.
fn fast_config() -> QueueConfig {
    QueueConfig {
        batch_size: 4,
        concurrency: 3,
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
        after_process_delay: Duration::from_millis(10),
    }
}

struct Pipeline {
    queue: Arc<TaskQueue>,
    content: ContentStore,
    metadata: MetadataStore,
    _temp: TempDir,
}

/// Wires a full pipeline whose texture prefix points at the mock server.
async fn pipeline(server: &MockServer, config: QueueConfig) -> Pipeline {
    let temp = TempDir::new().expect("failed to create temp dir");
    let content = ContentStore::new(temp.path()).expect("failed to create content store");
    let metadata = MetadataStore::new(
        Database::new_in_memory()
            .await
            .expect("failed to create database"),
    );
    let prefix = TexturePrefix::new(format!("{}/texture/", server.uri()));
    let admission = AdmissionFilter::new(content.clone(), prefix);
    let queue = TaskQueue::new(
        config,
        admission,
        TextureClient::new(),
        content.clone(),
        metadata.clone(),
    )
    .expect("failed to create queue");

    Pipeline {
        queue: Arc::new(queue),
        content,
        metadata,
        _temp: temp,
    }
}

fn descriptor(server: &MockServer, id: i64, hash: &str) -> SkinDescriptor {
    SkinDescriptor {
        id,
        name: Some(format!("skin-{id}")),
        skin_uuid: Some(format!("suid-{id}")),
        uuid: Some(format!("uuid-{id}")),
        url: format!("{}/texture/{hash}", server.uri()),
        time: 1_690_000_000.0,
        variant: Some("classic".to_string()),
    }
}

async fn mount_texture(server: &MockServer, hash: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/texture/{hash}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}

/// Drains every buffered event out of a broadcast receiver.
fn collect_events(rx: &mut broadcast::Receiver<TaskEvent>) -> Vec<TaskEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    events
}

/// Status tags of all task-scoped events for one task, batch progress
/// excluded.
fn lifecycle_of(events: &[TaskEvent], task_id: Uuid) -> Vec<&'static str> {
    events
        .iter()
        .filter(|event| event.task_id() == Some(task_id))
        .filter(|event| !matches!(event, TaskEvent::Progress { .. }))
        .map(TaskEvent::status)
        .collect()
}

#[tokio::test]
async fn test_pipeline_commits_file_and_row_exactly_once() {
    let server = MockServer::start().await;
    mount_texture(&server, "aa11", b"png bytes").await;
    let pipe = pipeline(&server, fast_config()).await;

    // Two pushes for the same URL inside one burst: the admission race
    // admits both, the idempotent writes converge to one end state.
    let first = pipe
        .queue
        .push(descriptor(&server, 1, "aa11"))
        .await
        .expect("push failed");
    assert!(matches!(first, PushOutcome::Queued(_)));
    let _second = pipe
        .queue
        .push(descriptor(&server, 1, "aa11"))
        .await
        .expect("push failed");

    pipe.queue.drain().await;

    let keys = pipe.content.keys().expect("failed to list store");
    assert_eq!(keys.len(), 1, "exactly one artifact file expected");
    assert_eq!(keys[0].as_str(), "aa11");
    assert_eq!(pipe.metadata.count().await.expect("count failed"), 1);

    // A later admission check for the same URL rejects outright
    let prefix = TexturePrefix::new(format!("{}/texture/", server.uri()));
    let admission = AdmissionFilter::new(pipe.content.clone(), prefix);
    assert_eq!(
        admission.admit(&descriptor(&server, 1, "aa11").url),
        Admission::Reject(RejectReason::AlreadyDownloaded)
    );
}

#[tokio::test]
async fn test_task_lifecycle_is_ordered_with_one_terminal_event() {
    let server = MockServer::start().await;
    mount_texture(&server, "bb22", b"png bytes").await;
    let pipe = pipeline(&server, fast_config()).await;
    let mut rx = pipe.queue.subscribe();

    let outcome = pipe
        .queue
        .push(descriptor(&server, 2, "bb22"))
        .await
        .expect("push failed");
    let PushOutcome::Queued(task_id) = outcome else {
        panic!("expected Queued, got {outcome:?}");
    };

    pipe.queue.drain().await;

    let events = collect_events(&mut rx);
    assert_eq!(
        lifecycle_of(&events, task_id),
        vec!["queued", "accepted", "started", "finished"]
    );
    let terminals = events
        .iter()
        .filter(|event| event.is_terminal() && event.task_id() == Some(task_id))
        .count();
    assert_eq!(terminals, 1, "terminal event must fire exactly once");
}

#[tokio::test]
async fn test_always_failing_fetch_exhausts_retries_then_fails() {
    let server = MockServer::start().await;
    // max_retries = 2 means exactly 3 attempts, then a terminal failure
    Mock::given(method("GET"))
        .and(path("/texture/cc33"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let pipe = pipeline(&server, fast_config()).await;
    let mut rx = pipe.queue.subscribe();

    let outcome = pipe
        .queue
        .push(descriptor(&server, 3, "cc33"))
        .await
        .expect("push failed");
    let PushOutcome::Queued(task_id) = outcome else {
        panic!("expected Queued, got {outcome:?}");
    };

    pipe.queue.drain().await;

    let events = collect_events(&mut rx);
    assert_eq!(
        lifecycle_of(&events, task_id),
        vec!["queued", "accepted", "started", "failed"]
    );

    // The failure event carries the last failure reason
    let failure = events
        .iter()
        .find_map(|event| match event {
            TaskEvent::Failed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .expect("expected a failed event");
    assert!(failure.contains("500"), "error should carry the reason: {failure}");

    let snap = pipe.queue.stats();
    assert_eq!(snap.total_retried, 2);
    assert_eq!(snap.total_failed, 1);
    assert_eq!(snap.total_completed, 0);

    // No partial file is left on disk and no row was written
    assert!(pipe.content.keys().expect("list failed").is_empty());
    assert_eq!(pipe.metadata.count().await.expect("count failed"), 0);
}

#[tokio::test]
async fn test_no_more_than_concurrency_batches_in_flight() {
    let server = MockServer::start().await;
    for hash in ["d0", "d1", "d2", "d3", "d4", "d5"] {
        Mock::given(method("GET"))
            .and(path(format!("/texture/{hash}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"png".to_vec())
                    .set_delay(Duration::from_millis(80)),
            )
            .mount(&server)
            .await;
    }

    // batch_size 1 makes task overlap equal batch overlap
    let config = QueueConfig {
        batch_size: 1,
        concurrency: 2,
        max_retries: 0,
        retry_delay: Duration::from_millis(10),
        after_process_delay: Duration::from_millis(1),
    };
    let pipe = pipeline(&server, config).await;
    let mut rx = pipe.queue.subscribe();

    for (id, hash) in ["d0", "d1", "d2", "d3", "d4", "d5"].into_iter().enumerate() {
        let outcome = pipe
            .queue
            .push(descriptor(&server, i64::try_from(id).expect("id"), hash))
            .await
            .expect("push failed");
        assert!(matches!(outcome, PushOutcome::Queued(_)));
    }

    pipe.queue.drain().await;

    // Replay the serialized event stream: the number of started tasks
    // without a terminal event never exceeds the concurrency bound.
    let events = collect_events(&mut rx);
    let mut running = 0usize;
    let mut max_running = 0usize;
    for event in &events {
        match event {
            TaskEvent::Started { .. } => {
                running += 1;
                max_running = max_running.max(running);
            }
            TaskEvent::Finished { .. } | TaskEvent::Failed { .. } => running -= 1,
            _ => {}
        }
    }
    assert!(
        max_running <= 2,
        "observed {max_running} concurrent batch bodies, bound is 2"
    );
    assert_eq!(pipe.queue.stats().total_completed, 6);
}

#[tokio::test]
async fn test_stored_key_is_rejected_before_any_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/texture/ee55"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    let pipe = pipeline(&server, fast_config()).await;

    // The artifact is already in the content store
    let key = skinvault::ArtifactKey::from_segment("ee55").expect("key");
    pipe.content.write(&key, b"png").await.expect("seed write");

    let outcome = pipe
        .queue
        .push(descriptor(&server, 5, "ee55"))
        .await
        .expect("push failed");
    assert_eq!(
        outcome,
        PushOutcome::Rejected(RejectReason::AlreadyDownloaded)
    );

    pipe.queue.drain().await;
    assert_eq!(pipe.metadata.count().await.expect("count failed"), 0);
}

#[tokio::test]
async fn test_discovery_tick_feeds_new_and_skips_stored() {
    let server = MockServer::start().await;
    let new_skin = descriptor(&server, 10, "f0a1");
    let stored_skin = descriptor(&server, 11, "f0b2");

    // pages_to_load = 1 pins every sampled index to page 0. The listing
    // is served once; the tick's remaining concurrent page fetches see
    // an empty page, so exactly one task per descriptor is pushed.
    Mock::given(method("GET"))
        .and(path("/get/list/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "skins": [
                {
                    "id": new_skin.id,
                    "name": "fresh",
                    "url": new_skin.url,
                    "time": 1690000000.0,
                },
                {
                    "id": stored_skin.id,
                    "name": "stale",
                    "url": stored_skin.url,
                    "time": 1690000000.0,
                },
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get/list/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "skins": [] })))
        .mount(&server)
        .await;
    mount_texture(&server, "f0a1", b"fresh png").await;
    Mock::given(method("GET"))
        .and(path("/texture/f0b2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let pipe = pipeline(&server, fast_config()).await;
    let stored_key = skinvault::ArtifactKey::from_segment("f0b2").expect("key");
    pipe.content.write(&stored_key, b"old png").await.expect("seed write");

    let catalog = CatalogClient::new(server.uri());
    let discovery = Discovery::new(catalog, Arc::clone(&pipe.queue), 1);

    discovery.tick().await;
    pipe.queue.drain().await;

    // The new descriptor went all the way to finished
    let new_key = skinvault::ArtifactKey::from_segment("f0a1").expect("key");
    assert!(pipe.content.exists(&new_key));
    assert!(pipe
        .metadata
        .contains_hash("f0a1")
        .await
        .expect("query failed"));

    // The stored one produced no new writes
    assert_eq!(pipe.metadata.count().await.expect("count failed"), 1);
    let snap = pipe.queue.stats();
    assert_eq!(snap.total_completed, 1);
    assert_eq!(snap.total_failed, 0);
}

#[tokio::test]
async fn test_discovery_survives_catalog_page_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get/list/0"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let pipe = pipeline(&server, fast_config()).await;
    let catalog = CatalogClient::new(server.uri());
    let discovery = Discovery::new(catalog, Arc::clone(&pipe.queue), 1);

    // Must not panic and must leave the queue usable
    discovery.tick().await;
    discovery.tick().await;

    assert_eq!(pipe.queue.stats().remaining, 0);
    pipe.queue.drain().await;
}

#[tokio::test]
async fn test_failure_does_not_abort_batch_siblings() {
    let server = MockServer::start().await;
    // a0 is slow so it occupies the single worker slot while a1 and a2
    // accumulate into a shared batch
    Mock::given(method("GET"))
        .and(path("/texture/a0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow png".to_vec())
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/texture/a1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_texture(&server, "a2", b"good png").await;

    // One worker slot so the two later pushes share a batch while the
    // first task occupies the pool
    let config = QueueConfig {
        batch_size: 8,
        concurrency: 1,
        max_retries: 0,
        retry_delay: Duration::from_millis(10),
        after_process_delay: Duration::from_millis(10),
    };
    let pipe = pipeline(&server, config).await;

    pipe.queue
        .push(descriptor(&server, 20, "a0"))
        .await
        .expect("push failed");
    tokio::time::sleep(Duration::from_millis(30)).await;
    pipe.queue
        .push(descriptor(&server, 21, "a1"))
        .await
        .expect("push failed");
    pipe.queue
        .push(descriptor(&server, 22, "a2"))
        .await
        .expect("push failed");

    pipe.queue.drain().await;

    let snap = pipe.queue.stats();
    assert_eq!(snap.total_completed, 2, "siblings of a failed task complete");
    assert_eq!(snap.total_failed, 1);
    assert_eq!(snap.total_batches, 2, "a0 alone, then a1+a2 together");

    let good_key = skinvault::ArtifactKey::from_segment("a2").expect("key");
    assert!(pipe.content.exists(&good_key));
}
