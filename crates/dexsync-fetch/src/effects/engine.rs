//! Window-bounded batch scheduler.
//!
//! One control flow admits requests up to the window, polls the open
//! transfers in place and retires them as they complete. No task is spawned
//! per transfer; every future lives in a `FuturesUnordered` owned by the
//! scheduler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use tracing::{debug, error, info, trace, warn};

use super::http::HttpClient;
use super::transfer::{self, ResponseMeta, Transfer, TransferCompletion, TransferId, TransferState};
use crate::core::{StatusClass, classify_status, conditional_headers};
use crate::data::{BatchProgress, BatchSummary, EngineOptions, FetchOutcome, FetchRequest, FetchResult, Target};
use crate::error::FetchError;
use dexsync_store::{ValidatorStore, Validators};

/// Incremental fetch engine.
///
/// Mirrors remote resources into files under `root`, sending stored
/// validators so unchanged resources come back as `304` and leave their
/// files alone.
///
/// # Examples
///
/// ```no_run
/// use dexsync_fetch::{Engine, EngineOptions, ReqwestClient};
/// use dexsync_store::MemoryStore;
///
/// # async fn demo() -> dexsync_fetch::Result<()> {
/// let options = EngineOptions::default().window(8);
/// let client = ReqwestClient::from_options(&options)?;
/// let engine = Engine::new(client, MemoryStore::new(), "data").with_options(options);
///
/// let results = engine
///     .fetch_batch([("https://api.tcgdex.net/v2/en/sets", "en/sets.json")])
///     .await;
/// for result in &results {
///     println!("{result}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Engine<C, S> {
    client:  C,
    store:   S,
    root:    PathBuf,
    options: EngineOptions,
}

impl<C: HttpClient, S: ValidatorStore> Engine<C, S> {
    pub fn new(client: C, store: S, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            store,
            root: root.into(),
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions { &self.options }

    pub fn root(&self) -> &Path { &self.root }

    pub fn client(&self) -> &C { &self.client }

    pub fn store(&self) -> &S { &self.store }

    /// Fetch every target and return one result per target, in input order.
    ///
    /// At most `window` transfers are open at any moment. Individual
    /// failures never abort the batch; they are reported in the result at
    /// the failing target's index.
    pub async fn fetch_batch<I, T>(&self, targets: I) -> Vec<FetchResult>
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        let requests = FetchRequest::batch(targets);
        debug!(
            total = requests.len(),
            window = self.options.effective_window(),
            root = %self.root.display(),
            "starting batch"
        );

        let present = self.existing_destinations(&requests).await;
        let results = Scheduler::new(self, requests, present).run().await;

        let summary = BatchSummary::from_results(&results);
        info!(%summary, "batch finished");
        results
    }

    /// Whether each request's destination exists, resolved before scheduling
    /// so the control loop never stats the filesystem.
    ///
    /// Everything counts as present under `revalidate_missing`.
    async fn existing_destinations(&self, requests: &[FetchRequest]) -> Vec<bool> {
        if self.options.revalidate_missing {
            return vec![true; requests.len()];
        }

        futures_util::stream::iter(requests)
            .map(|request| {
                let path = self.root.join(request.destination());
                async move {
                    match tokio::fs::try_exists(&path).await {
                        Ok(present) => present,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "cannot stat destination");
                            false
                        }
                    }
                }
            })
            .buffered(self.options.effective_window())
            .collect()
            .await
    }
}

struct Scheduler<'a, C: HttpClient, S> {
    engine:    &'a Engine<C, S>,
    /// Requests not yet admitted, each with whether its destination exists.
    pending:   std::iter::Zip<std::vec::IntoIter<FetchRequest>, std::vec::IntoIter<bool>>,
    uris:      Vec<String>,
    table:     HashMap<TransferId, Transfer>,
    in_flight: FuturesUnordered<BoxFuture<'a, TransferCompletion>>,
    results:   Vec<Option<FetchResult>>,
    progress:  BatchProgress,
    next_id:   u64,
}

impl<'a, C: HttpClient, S: ValidatorStore> Scheduler<'a, C, S> {
    fn new(engine: &'a Engine<C, S>, requests: Vec<FetchRequest>, present: Vec<bool>) -> Self {
        let total = requests.len();
        Self {
            engine,
            uris: requests.iter().map(|r| r.uri().to_string()).collect(),
            pending: requests.into_iter().zip(present),
            table: HashMap::new(),
            in_flight: FuturesUnordered::new(),
            results: vec![None; total],
            progress: BatchProgress::new(total),
            next_id: 0,
        }
    }

    async fn run(mut self) -> Vec<FetchResult> {
        let poll_interval = self.engine.options.poll_interval;

        loop {
            self.admit();
            if self.table.is_empty() {
                break;
            }

            match tokio::time::timeout(poll_interval, self.in_flight.next()).await {
                Ok(Some(completion)) => self.retire(completion),
                Ok(None) => {
                    error!(open = self.table.len(), "transfer table has entries with no running transfer");
                    break;
                }
                Err(_) => {}
            }

            while let Some(Some(completion)) = self.in_flight.next().now_or_never() {
                self.retire(completion);
            }

            self.report();
        }

        self.report();
        self.finish()
    }

    /// Open transfers until the window is full or every request is admitted.
    fn admit(&mut self) {
        let window = self.engine.options.effective_window();

        while self.table.len() < window {
            let Some((request, present)) = self.pending.next() else {
                break;
            };
            self.admit_one(request, present);
        }
    }

    fn admit_one(&mut self, request: FetchRequest, present: bool) {
        let engine = self.engine;
        let id = TransferId::new(self.next_id);
        self.next_id += 1;

        let destination = engine.root.join(request.destination());
        let mut transfer = Transfer::new(id, request);
        transfer.validators = if present {
            self.resolve_validators(transfer.request.uri())
        } else {
            trace!(%id, path = %destination.display(), "destination missing, fetching unconditionally");
            None
        };
        transfer.advance(TransferState::Admitted);

        let headers = conditional_headers(&engine.options.accept, transfer.validators.as_ref());
        trace!(
            %id,
            uri = transfer.request.uri(),
            conditional = transfer.validators.is_some(),
            "admitting transfer"
        );

        self.in_flight.push(
            transfer::run(
                &engine.client,
                id,
                transfer.request.uri().to_string(),
                destination,
                headers,
                engine.options.transfer_timeout,
            )
            .boxed(),
        );
        transfer.advance(TransferState::InFlight);

        self.table.insert(id, transfer);
        self.progress.admitted += 1;
        self.progress.in_flight = self.table.len();
    }

    /// Stored validators for `uri`; `None` makes the request unconditional.
    fn resolve_validators(&self, uri: &str) -> Option<Validators> {
        match self.engine.store.get(uri) {
            Ok(validators) => validators,
            Err(e) => {
                warn!(uri, error = %e, "validator lookup failed, fetching unconditionally");
                None
            }
        }
    }

    fn retire(&mut self, completion: TransferCompletion) {
        let Some(mut transfer) = self.table.remove(&completion.id) else {
            warn!(id = %completion.id, "completion for unknown transfer");
            return;
        };

        let (outcome, completed) = match completion.response {
            Ok(meta) => match classify_status(meta.status) {
                StatusClass::Changed => {
                    self.record_validators(transfer.request.uri(), meta);
                    (FetchOutcome::Changed, TransferState::CompletedChanged)
                }
                StatusClass::Unchanged => (FetchOutcome::Unchanged, TransferState::CompletedUnchanged),
                StatusClass::Rejected(status) => (
                    FetchOutcome::Failed(FetchError::Status(status)),
                    TransferState::CompletedFailed,
                ),
            },
            Err(e) => (FetchOutcome::Failed(e), TransferState::CompletedFailed),
        };
        transfer.advance(completed);

        match &outcome {
            FetchOutcome::Changed => self.progress.changed += 1,
            FetchOutcome::Unchanged => self.progress.unchanged += 1,
            FetchOutcome::Failed(e) => {
                self.progress.failed += 1;
                debug!(uri = transfer.request.uri(), error = %e, "transfer failed");
            }
        }
        self.progress.completed += 1;
        self.progress.in_flight = self.table.len();

        transfer.advance(TransferState::Retired);
        debug!(
            id = %transfer.id,
            uri = transfer.request.uri(),
            elapsed = ?transfer.elapsed(),
            "transfer retired"
        );

        let request = transfer.request;
        let index = request.index;
        let effective_uri = completion
            .effective_uri
            .unwrap_or_else(|| request.uri().to_string());
        let result = FetchResult {
            index,
            uri: request.target.uri,
            effective_uri,
            outcome,
        };

        match self.results.get_mut(index) {
            Some(slot) => *slot = Some(result),
            None => error!(index, "result index out of range"),
        }
    }

    fn record_validators(&self, uri: &str, meta: ResponseMeta) {
        let validators = Validators {
            uri:           uri.to_string(),
            etag:          meta.etag,
            last_modified: meta.last_modified,
        };

        if let Err(e) = self.engine.store.upsert(&validators) {
            error!(uri, error = %e, "failed to store validators");
        }
    }

    fn report(&self) {
        trace!(progress = %self.progress, "batch progress");
        if let Some(callback) = &self.engine.options.on_progress {
            callback(&self.progress);
        }
    }

    fn finish(self) -> Vec<FetchResult> {
        self.results
            .into_iter()
            .zip(self.uris)
            .enumerate()
            .map(|(index, (slot, uri))| {
                slot.unwrap_or_else(|| FetchResult {
                    index,
                    effective_uri: uri.clone(),
                    uri,
                    outcome: FetchOutcome::Failed(FetchError::Abandoned),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::http::HttpResponse;
    use dexsync_store::MemoryStore;

    #[derive(Debug)]
    struct Offline;

    impl std::fmt::Display for Offline {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("offline") }
    }

    impl std::error::Error for Offline {}

    impl HttpClient for Offline {
        type Error = Offline;

        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
        ) -> std::result::Result<HttpResponse<Offline>, Offline> {
            Err(Offline)
        }
    }

    #[tokio::test]
    async fn destinations_are_checked_before_scheduling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();
        let requests = FetchRequest::batch([("https://x/a", "a.json"), ("https://x/b", "b.json")]);

        let engine = Engine::new(Offline, MemoryStore::new(), dir.path());
        assert_eq!(engine.existing_destinations(&requests).await, vec![true, false]);

        let engine = engine.with_options(EngineOptions::default().revalidate_missing(true));
        assert_eq!(engine.existing_destinations(&requests).await, vec![true, true]);
    }
}
