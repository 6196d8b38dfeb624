//! Scheduler behavior against a scripted HTTP client.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use dexsync_fetch::{
    BatchProgress, Engine, EngineOptions, FetchError, FetchOutcome, HttpClient, HttpResponse,
    ValidatorStore, Validators,
};
use dexsync_store::{MemoryStore, StoreError};
use futures_util::StreamExt;
use tokio::sync::Semaphore;

#[derive(Debug)]
struct StubError(String);

impl std::fmt::Display for StubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

impl std::error::Error for StubError {}

/// Scripted answer for one uri.
#[derive(Debug, Clone)]
enum Reply {
    Respond {
        status:        u16,
        etag:          Option<&'static str>,
        last_modified: Option<&'static str>,
        effective_url: Option<&'static str>,
        chunks:        Vec<&'static [u8]>,
    },
    /// Fails before any response arrives.
    Refused,
    /// Sends some bytes, then the connection breaks.
    BrokenBody(&'static [u8]),
    /// Never answers.
    Hang,
}

impl Reply {
    fn ok(body: &'static [u8]) -> Self {
        Self::Respond {
            status:        200,
            etag:          None,
            last_modified: None,
            effective_url: None,
            chunks:        vec![body],
        }
    }

    fn status(status: u16) -> Self {
        Self::Respond {
            status,
            etag: None,
            last_modified: None,
            effective_url: None,
            chunks: Vec::new(),
        }
    }

    fn with_etag(mut self, value: &'static str) -> Self {
        if let Self::Respond { etag, .. } = &mut self {
            *etag = Some(value);
        }
        self
    }

    fn with_last_modified(mut self, value: &'static str) -> Self {
        if let Self::Respond { last_modified, .. } = &mut self {
            *last_modified = Some(value);
        }
        self
    }

    fn redirected_to(mut self, url: &'static str) -> Self {
        if let Self::Respond { effective_url, .. } = &mut self {
            *effective_url = Some(url);
        }
        self
    }
}

/// Decrements the open-transfer counter when the response body goes away.
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}

#[derive(Default)]
struct StubClient {
    routes:   HashMap<String, Reply>,
    fallback: Option<Reply>,
    delay:    Duration,
    /// Each response waits for one permit when set.
    gate:     Option<Arc<Semaphore>>,
    seen:     Mutex<Vec<(String, Vec<(String, String)>)>>,
    open:     Arc<AtomicUsize>,
    peak:     Arc<AtomicUsize>,
}

impl StubClient {
    fn new() -> Self { Self::default() }

    fn route(mut self, uri: &str, reply: Reply) -> Self {
        self.routes.insert(uri.to_string(), reply);
        self
    }

    fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn requests(&self) -> usize { self.seen.lock().unwrap().len() }

    fn header(&self, uri: &str, name: &str) -> Option<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|(seen, _)| seen == uri)
            .and_then(|(_, headers)| headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone()))
    }

    fn peak(&self) -> usize { self.peak.load(Ordering::SeqCst) }

    fn open(&self) -> usize { self.open.load(Ordering::SeqCst) }
}

impl HttpClient for StubClient {
    type Error = StubError;

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse<StubError>, StubError> {
        self.seen.lock().unwrap().push((url.to_string(), headers.to_vec()));

        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = OpenGuard(self.open.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .routes
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or(Reply::status(404));

        match reply {
            Reply::Respond {
                status,
                etag,
                last_modified,
                effective_url,
                chunks,
            } => {
                let body = futures_util::stream::iter(chunks)
                    .map(move |chunk| {
                        let _open = &guard;
                        Ok::<_, StubError>(Bytes::from_static(chunk))
                    });
                Ok(HttpResponse {
                    status,
                    effective_url: effective_url.unwrap_or(url).to_string(),
                    etag: etag.map(str::to_string),
                    last_modified: last_modified.map(str::to_string),
                    body: Box::pin(body),
                })
            }
            Reply::Refused => Err(StubError("connection refused".to_string())),
            Reply::BrokenBody(prefix) => {
                let chunks: Vec<Result<Bytes, StubError>> = vec![
                    Ok(Bytes::from_static(prefix)),
                    Err(StubError("connection reset".to_string())),
                ];
                let body = futures_util::stream::iter(chunks).map(move |chunk| {
                    let _open = &guard;
                    chunk
                });
                Ok(HttpResponse {
                    status: 200,
                    effective_url: url.to_string(),
                    etag: Some("\"broken\"".to_string()),
                    last_modified: None,
                    body: Box::pin(body),
                })
            }
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(StubError("unreachable".to_string()))
            }
        }
    }
}

/// Accepts reads, refuses every write.
struct ReadOnlyStore(MemoryStore);

impl ValidatorStore for ReadOnlyStore {
    fn get(&self, uri: &str) -> dexsync_store::Result<Option<Validators>> { self.0.get(uri) }

    fn upsert(&self, _validators: &Validators) -> dexsync_store::Result<()> { Err(StoreError::Poisoned) }
}

/// Fails every operation.
struct BrokenStore;

impl ValidatorStore for BrokenStore {
    fn get(&self, _uri: &str) -> dexsync_store::Result<Option<Validators>> { Err(StoreError::Poisoned) }

    fn upsert(&self, _validators: &Validators) -> dexsync_store::Result<()> { Err(StoreError::Poisoned) }
}

const A: &str = "https://x/a.json";
const DATE: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

async fn wait_for(mut ready: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn first_fetch_writes_body_and_stores_validators() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new().route(A, Reply::ok(b"{}").with_etag("v1"));
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine.fetch_batch([(A, "out/a.json")]).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].index, 0);
    assert_eq!(results[0].outcome, FetchOutcome::Changed);
    assert_eq!(std::fs::read(dir.path().join("out/a.json")).unwrap(), b"{}");
    assert_eq!(engine.client().header(A, "If-None-Match"), None);
    assert_eq!(
        engine.store().get(A).unwrap(),
        Some(Validators::new(A).with_etag("v1"))
    );
}

#[tokio::test]
async fn stored_etag_yields_not_modified() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "out/a.json", b"{\"kept\":true}");
    let store: MemoryStore = [Validators::new(A).with_etag("v1")].into_iter().collect();
    let client = StubClient::new().route(A, Reply::status(304));
    let engine = Engine::new(client, store, dir.path());

    let results = engine.fetch_batch([(A, "out/a.json")]).await;

    assert_eq!(results[0].outcome, FetchOutcome::Unchanged);
    assert_eq!(engine.client().header(A, "If-None-Match").as_deref(), Some("v1"));
    assert_eq!(engine.client().header(A, "Accept").as_deref(), Some("application/json"));
    assert_eq!(
        std::fs::read(dir.path().join("out/a.json")).unwrap(),
        b"{\"kept\":true}"
    );
}

#[tokio::test]
async fn window_bounds_open_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new()
        .fallback(Reply::ok(b"[]"))
        .delay(Duration::from_millis(20));
    let engine = Engine::new(client, MemoryStore::new(), dir.path())
        .with_options(EngineOptions::default().window(3).poll_interval(Duration::from_millis(5)));

    let targets: Vec<_> = (0..10)
        .map(|i| (format!("https://x/{i}.json"), format!("{i}.json")))
        .collect();
    let results = engine.fetch_batch(targets).await;

    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.has_changed()));
    assert_eq!(engine.client().requests(), 10);
    assert!(engine.client().peak() <= 3, "peak was {}", engine.client().peak());
    assert!(engine.client().peak() >= 2);
}

#[tokio::test]
async fn stalled_window_admits_only_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let client = StubClient::new()
        .fallback(Reply::ok(b"[]"))
        .gated(gate.clone());
    let engine = Engine::new(client, MemoryStore::new(), dir.path())
        .with_options(EngineOptions::default().window(3).poll_interval(Duration::from_millis(5)));
    let targets: Vec<_> = (0..5)
        .map(|i| (format!("https://x/{i}.json"), format!("{i}.json")))
        .collect();

    let release = async {
        let client = engine.client();
        wait_for(|| client.requests() == 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.requests(), 3);
        assert_eq!(client.open(), 3);

        gate.add_permits(1);
        wait_for(|| client.requests() == 4).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.requests(), 4);
        assert_eq!(client.open(), 3);

        gate.add_permits(5);
    };
    let (results, ()) = tokio::join!(engine.fetch_batch(targets), release);

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.has_changed()));
    assert_eq!(engine.client().requests(), 5);
    assert_eq!(engine.client().peak(), 3);
    assert_eq!(engine.client().open(), 0);
}

#[tokio::test]
async fn results_follow_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new()
        .route("https://x/slow", Reply::ok(b"slow"))
        .route("https://x/missing", Reply::status(404))
        .route("https://x/fast", Reply::status(304))
        .delay(Duration::from_millis(5));
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine
        .fetch_batch([
            ("https://x/slow", "slow.txt"),
            ("https://x/missing", "missing.txt"),
            ("https://x/fast", "fast.txt"),
        ])
        .await;

    let indices: Vec<_> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(results[0].uri, "https://x/slow");
    assert_eq!(results[1].outcome, FetchOutcome::Failed(FetchError::Status(404)));
    assert_eq!(results[2].outcome, FetchOutcome::Unchanged);
}

#[tokio::test]
async fn empty_batch_returns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(StubClient::new(), MemoryStore::new(), dir.path());

    let results = engine.fetch_batch(Vec::<(String, String)>::new()).await;

    assert!(results.is_empty());
    assert_eq!(engine.client().requests(), 0);
}

#[tokio::test]
async fn error_status_keeps_file_and_validators() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.json", b"old");
    let stored = Validators::new(A).with_etag("v1");
    let store: MemoryStore = [stored.clone()].into_iter().collect();
    let client = StubClient::new().route(
        A,
        Reply::Respond {
            status:        500,
            etag:          Some("v2"),
            last_modified: None,
            effective_url: None,
            chunks:        vec![&b"internal error page"[..]],
        },
    );
    let engine = Engine::new(client, store, dir.path());

    let results = engine.fetch_batch([(A, "a.json")]).await;

    assert_eq!(results[0].outcome, FetchOutcome::Failed(FetchError::Status(500)));
    assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"old");
    assert_eq!(engine.store().get(A).unwrap(), Some(stored));
}

#[tokio::test]
async fn always_not_modified_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new().fallback(Reply::status(304));
    let engine = Engine::new(client, MemoryStore::new(), dir.path())
        .with_options(EngineOptions::default().revalidate_missing(true));
    let targets = [("https://x/1", "one.json"), ("https://x/2", "two.json")];

    let first = engine.fetch_batch(targets).await;
    let second = engine.fetch_batch(targets).await;

    assert_eq!(first, second);
    assert!(first.iter().all(|r| r.outcome == FetchOutcome::Unchanged));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn transport_failure_is_reported_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new()
        .route("https://x/down", Reply::Refused)
        .route(A, Reply::ok(b"{}"));
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine
        .fetch_batch([("https://x/down", "down.json"), (A, "a.json")])
        .await;

    let error = results[0].outcome.error().unwrap();
    assert!(error.is_transport());
    assert_eq!(results[0].effective_uri, "https://x/down");
    assert!(!dir.path().join("down.json").exists());
    assert!(results[1].has_changed());
}

#[tokio::test]
async fn broken_body_removes_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "img/a.jpg", b"previous image");
    let client = StubClient::new().route(A, Reply::BrokenBody(b"half"));
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine.fetch_batch([(A, "img/a.jpg")]).await;

    assert!(results[0].outcome.error().unwrap().is_transport());
    assert!(!dir.path().join("img/a.jpg").exists());
    assert!(engine.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hanging_transfer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new()
        .route("https://x/hang", Reply::Hang)
        .route(A, Reply::status(304));
    let engine = Engine::new(client, MemoryStore::new(), dir.path())
        .with_options(EngineOptions::default().transfer_timeout(Duration::from_secs(5)));

    let results = engine
        .fetch_batch([("https://x/hang", "hang.json"), (A, "a.json")])
        .await;

    assert_eq!(
        results[0].outcome,
        FetchOutcome::Failed(FetchError::Timeout(Duration::from_secs(5)))
    );
    assert_eq!(results[1].outcome, FetchOutcome::Unchanged);
    assert_eq!(engine.client().open(), 0);
}

#[tokio::test]
async fn failed_upsert_keeps_changed_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new().route(A, Reply::ok(b"{}").with_etag("v1"));
    let engine = Engine::new(client, ReadOnlyStore(MemoryStore::new()), dir.path());

    let results = engine.fetch_batch([(A, "a.json")]).await;

    assert_eq!(results[0].outcome, FetchOutcome::Changed);
    assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"{}");
}

#[tokio::test]
async fn failed_lookup_fetches_unconditionally() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.json", b"old");
    let client = StubClient::new().route(A, Reply::ok(b"new"));
    let engine = Engine::new(client, BrokenStore, dir.path());

    let results = engine.fetch_batch([(A, "a.json")]).await;

    assert!(results[0].has_changed());
    assert_eq!(engine.client().header(A, "If-None-Match"), None);
    assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"new");
}

#[tokio::test]
async fn last_modified_is_sent_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();

    let client = StubClient::new().route(A, Reply::ok(b"{}").with_last_modified(DATE));
    let first = Engine::new(client, &store, dir.path());
    let results = first.fetch_batch([(A, "a.json")]).await;

    assert!(results[0].has_changed());
    assert_eq!(store.get(A).unwrap(), Some(Validators::new(A).with_last_modified(DATE)));

    let client = StubClient::new().route(A, Reply::status(304));
    let second = Engine::new(client, &store, dir.path());
    let results = second.fetch_batch([(A, "a.json")]).await;

    assert_eq!(results[0].outcome, FetchOutcome::Unchanged);
    assert_eq!(second.client().header(A, "If-Modified-Since").as_deref(), Some(DATE));
    assert_eq!(second.client().header(A, "If-None-Match"), None);
    assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"{}");
}

#[tokio::test]
async fn missing_destination_is_fetched_unconditionally() {
    let dir = tempfile::tempdir().unwrap();
    let store: MemoryStore = [Validators::new(A).with_etag("v1")].into_iter().collect();
    let client = StubClient::new().route(A, Reply::ok(b"{}").with_etag("v2"));
    let engine = Engine::new(client, store, dir.path());

    let results = engine.fetch_batch([(A, "gone.json")]).await;

    assert!(results[0].has_changed());
    assert_eq!(engine.client().header(A, "If-None-Match"), None);
    assert!(dir.path().join("gone.json").exists());
    assert_eq!(engine.store().get(A).unwrap().unwrap().etag.as_deref(), Some("v2"));
}

#[tokio::test]
async fn revalidating_missing_destination_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let store: MemoryStore = [Validators::new(A).with_etag("v1")].into_iter().collect();
    let client = StubClient::new().route(A, Reply::status(304));
    let engine = Engine::new(client, store, dir.path())
        .with_options(EngineOptions::default().revalidate_missing(true));

    let results = engine.fetch_batch([(A, "gone.json")]).await;

    assert_eq!(results[0].outcome, FetchOutcome::Unchanged);
    assert_eq!(engine.client().header(A, "If-None-Match").as_deref(), Some("v1"));
    assert!(!dir.path().join("gone.json").exists());
}

#[tokio::test]
async fn validators_are_keyed_by_requested_uri() {
    let dir = tempfile::tempdir().unwrap();
    let client = StubClient::new().route(
        A,
        Reply::ok(b"{}")
            .with_etag("v1")
            .redirected_to("https://cdn.x/a.json"),
    );
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine.fetch_batch([(A, "a.json")]).await;

    assert_eq!(results[0].uri, A);
    assert_eq!(results[0].effective_uri, "https://cdn.x/a.json");
    assert!(engine.store().get(A).unwrap().is_some());
    assert!(engine.store().get("https://cdn.x/a.json").unwrap().is_none());
}

#[tokio::test]
async fn empty_ok_body_truncates_destination() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.json", b"stale");
    let client = StubClient::new().route(A, Reply::status(200));
    let engine = Engine::new(client, MemoryStore::new(), dir.path());

    let results = engine.fetch_batch([(A, "a.json")]).await;

    assert!(results[0].has_changed());
    assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"");
}

#[tokio::test]
async fn progress_reaches_completion() {
    let dir = tempfile::tempdir().unwrap();
    let seen: Arc<Mutex<Vec<BatchProgress>>> = Arc::default();
    let sink = seen.clone();
    let options = EngineOptions::default()
        .window(2)
        .on_progress(move |progress| sink.lock().unwrap().push(*progress));
    let client = StubClient::new()
        .route("https://x/1", Reply::ok(b"1"))
        .route("https://x/2", Reply::status(304))
        .route("https://x/3", Reply::status(410));
    let engine = Engine::new(client, MemoryStore::new(), dir.path()).with_options(options);

    engine
        .fetch_batch([
            ("https://x/1", "1"),
            ("https://x/2", "2"),
            ("https://x/3", "3"),
        ])
        .await;

    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|p| p.in_flight <= 2));
    let last = seen.last().unwrap();
    assert!(last.is_finished());
    assert_eq!((last.changed, last.unchanged, last.failed), (1, 1, 1));
    assert_eq!(last.admitted, 3);
}
