use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{QueryState, RequestId},
    protocol::{QueryRequest, QueryResponse},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::TransportError, transport::QueryBackend};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryOptions {
    pub top_k: Option<u32>,
    pub alpha: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Completed(QueryResponse),
    /// Carries the transport diagnostic; it is logged, never shown.
    Failed(String),
    Cancelled,
}

impl QueryOutcome {
    pub fn state(&self) -> QueryState {
        match self {
            QueryOutcome::Completed(_) => QueryState::Completed,
            QueryOutcome::Failed(_) => QueryState::Failed,
            QueryOutcome::Cancelled => QueryState::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledQuery {
    pub id: RequestId,
    pub query: String,
}

struct ActiveQuery {
    id: RequestId,
    query: String,
    token: CancellationToken,
}

#[derive(Default)]
struct ControllerState {
    last_request_id: u64,
    active: Option<ActiveQuery>,
}

/// Runs at most one query at a time against a [`QueryBackend`].
///
/// A request occupies the controller's single slot from [`begin`] until it is
/// detached, either by [`finish`] after it settles or by [`cancel`]. Whoever
/// detaches a request reports its outcome, so every request is reported
/// exactly once.
///
/// [`begin`]: QueryController::begin
/// [`finish`]: QueryController::finish
/// [`cancel`]: QueryController::cancel
pub struct QueryController {
    backend: Arc<dyn QueryBackend>,
    options: QueryOptions,
    inner: Mutex<ControllerState>,
}

/// A request that holds the controller's slot and has not settled yet.
pub struct PendingQuery {
    id: RequestId,
    request: QueryRequest,
    token: CancellationToken,
    backend: Arc<dyn QueryBackend>,
}

impl PendingQuery {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.request.query
    }

    /// Issues the backend call and classifies how it settled. Once the token
    /// has been cancelled the result is `Cancelled` whatever the backend sent.
    pub async fn settle(&self) -> QueryOutcome {
        if self.token.is_cancelled() {
            return QueryOutcome::Cancelled;
        }

        let result = self
            .backend
            .query(self.request.clone(), self.token.clone())
            .await;

        if self.token.is_cancelled() {
            if result.is_ok() {
                debug!(request_id = %self.id, "query: discarding response that arrived after cancellation");
            }
            return QueryOutcome::Cancelled;
        }

        match result {
            Ok(response) => {
                info!(
                    request_id = %self.id,
                    sources = response.sources.len(),
                    "query: completed"
                );
                QueryOutcome::Completed(response)
            }
            Err(TransportError::Cancelled) => QueryOutcome::Cancelled,
            Err(err) => {
                warn!(request_id = %self.id, error = %err, "query: failed");
                QueryOutcome::Failed(err.to_string())
            }
        }
    }
}

impl QueryController {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self::with_options(backend, QueryOptions::default())
    }

    pub fn with_options(backend: Arc<dyn QueryBackend>, options: QueryOptions) -> Self {
        Self {
            backend,
            options,
            inner: Mutex::new(ControllerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.lock().active.as_ref().map(|active| active.id)
    }

    /// Claims the slot for `query_text`. Returns `None` without touching the
    /// backend when the trimmed text is empty or another request is pending.
    pub fn begin(&self, query_text: &str) -> Option<PendingQuery> {
        let query = query_text.trim();
        if query.is_empty() {
            return None;
        }

        let mut state = self.lock();
        if let Some(active) = &state.active {
            debug!(pending = %active.id, "query: ignoring submit while a request is pending");
            return None;
        }

        state.last_request_id += 1;
        let id = RequestId(state.last_request_id);
        let token = CancellationToken::new();
        state.active = Some(ActiveQuery {
            id,
            query: query.to_string(),
            token: token.clone(),
        });
        drop(state);

        info!(request_id = %id, "query: submitted");
        Some(PendingQuery {
            id,
            request: QueryRequest {
                query: query.to_string(),
                top_k: self.options.top_k,
                alpha: self.options.alpha,
            },
            token,
            backend: Arc::clone(&self.backend),
        })
    }

    /// Detaches `id` after it settled. Returns `false` if the request was
    /// already detached by [`cancel`](Self::cancel), in which case its settled
    /// result is stale.
    pub fn finish(&self, id: RequestId) -> bool {
        let mut state = self.lock();
        if state.active.as_ref().map(|active| active.id) != Some(id) {
            return false;
        }
        state.active = None;
        true
    }

    /// Cancels and detaches the pending request, if any. The slot is free as
    /// soon as this returns.
    pub fn cancel(&self) -> Option<CancelledQuery> {
        let active = self.lock().active.take()?;
        Some(Self::cancel_active(active))
    }

    /// Like [`cancel`](Self::cancel), but only while `id` still holds the
    /// slot; a newer request is left untouched.
    pub fn cancel_request(&self, id: RequestId) -> Option<CancelledQuery> {
        let active = {
            let mut state = self.lock();
            if state.active.as_ref().map(|active| active.id) != Some(id) {
                return None;
            }
            state.active.take()?
        };
        Some(Self::cancel_active(active))
    }

    fn cancel_active(active: ActiveQuery) -> CancelledQuery {
        active.token.cancel();
        info!(request_id = %active.id, "query: cancelled");
        CancelledQuery {
            id: active.id,
            query: active.query,
        }
    }

    /// Runs one query end to end. `None` means the submit was ignored.
    pub async fn submit(&self, query_text: &str) -> Option<QueryOutcome> {
        let pending = self.begin(query_text)?;
        let outcome = pending.settle().await;
        if self.finish(pending.id()) {
            Some(outcome)
        } else {
            Some(QueryOutcome::Cancelled)
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
