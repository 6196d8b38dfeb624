//! A single conditional GET streamed into its lazy [`Sink`].

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tracing::{trace, warn};

use super::http::{HttpClient, HttpResponse};
use super::sink::Sink;
use crate::core::classify_status;
use crate::data::FetchRequest;
use crate::error::{FetchError, Result};
use dexsync_store::Validators;

/// Key of a transfer in the scheduler's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TransferId(u64);

impl TransferId {
    pub(crate) fn new(raw: u64) -> Self { Self(raw) }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferState {
    Created,
    Admitted,
    InFlight,
    CompletedUnchanged,
    CompletedChanged,
    CompletedFailed,
    Retired,
}

impl TransferState {
    fn can_advance_to(self, next: Self) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Created, Admitted)
                | (Admitted, InFlight)
                | (InFlight, CompletedUnchanged | CompletedChanged | CompletedFailed)
                | (CompletedUnchanged | CompletedChanged | CompletedFailed, Retired)
        )
    }
}

/// Table entry for one admitted request.
#[derive(Debug)]
pub(crate) struct Transfer {
    pub(crate) id:         TransferId,
    pub(crate) request:    FetchRequest,
    pub(crate) validators: Option<Validators>,
    state:                 TransferState,
    started:               Instant,
}

impl Transfer {
    pub(crate) fn new(id: TransferId, request: FetchRequest) -> Self {
        Self {
            id,
            request,
            validators: None,
            state: TransferState::Created,
            started: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> TransferState { self.state }

    pub(crate) fn elapsed(&self) -> Duration { self.started.elapsed() }

    /// Move to `next`, logging the transition.
    pub(crate) fn advance(&mut self, next: TransferState) {
        if !self.state.can_advance_to(next) {
            warn!(id = %self.id, from = ?self.state, to = ?next, "unexpected transfer transition");
        }
        trace!(id = %self.id, uri = self.request.uri(), from = ?self.state, to = ?next, "transfer state");
        self.state = next;
    }
}

/// Status line and validators of a finished exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseMeta {
    pub(crate) status:        u16,
    pub(crate) etag:          Option<String>,
    pub(crate) last_modified: Option<String>,
}

/// What a transfer future hands back to the scheduler.
#[derive(Debug)]
pub(crate) struct TransferCompletion {
    pub(crate) id:            TransferId,
    /// `None` when no response arrived.
    pub(crate) effective_uri: Option<String>,
    pub(crate) response:      Result<ResponseMeta>,
}

/// Perform one GET and stream a `200` body into `destination`.
///
/// The sink is always closed before this returns. On any failure whatever it
/// wrote is removed again, so a destination is either left untouched or fully
/// replaced.
pub(crate) async fn run<C: HttpClient>(
    client: &C,
    id: TransferId,
    url: String,
    destination: PathBuf,
    headers: Vec<(String, String)>,
    timeout: Duration,
) -> TransferCompletion {
    let mut sink = Sink::new(destination);
    let mut effective_uri = None;

    let exchanged = tokio::time::timeout(
        timeout,
        exchange(client, &url, &headers, &mut sink, &mut effective_uri),
    )
    .await;

    let response = match exchanged {
        Ok(Ok(meta)) => sink.close().await.map(|()| meta),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    if let Err(e) = &response {
        trace!(%id, %url, error = %e, "transfer failed");
        if let Err(discard) = sink.discard().await {
            warn!(path = %sink.path().display(), error = %discard, "failed to remove partial destination");
        }
    }

    TransferCompletion {
        id,
        effective_uri,
        response,
    }
}

async fn exchange<C: HttpClient>(
    client: &C,
    url: &str,
    headers: &[(String, String)],
    sink: &mut Sink,
    effective_uri: &mut Option<String>,
) -> Result<ResponseMeta> {
    let response = client.get(url, headers).await.map_err(FetchError::transport)?;
    *effective_uri = Some(response.effective_url.clone());

    let HttpResponse {
        status,
        etag,
        last_modified,
        mut body,
        ..
    } = response;

    // Only a full response may replace the destination; other bodies are dropped unread.
    if classify_status(status).accepts_body() {
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(FetchError::transport)?;
            sink.write(&chunk).await?;
        }
        sink.materialize().await?;
    }

    Ok(ResponseMeta {
        status,
        etag,
        last_modified,
    })
}
