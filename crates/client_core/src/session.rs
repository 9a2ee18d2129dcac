use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{QueryState, RequestId},
    protocol::Source,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    controller::{CancelledQuery, QueryController, QueryOptions, QueryOutcome},
    sources::{normalize_sources, SourceView},
    timeline::{Message, Timeline},
    transport::QueryBackend,
};

pub const FAILED_CONTENT: &str = "Sorry, something went wrong fetching the answer.";
pub const STOPPED_CONTENT: &str = "Generation stopped.";

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended {
        message: Message,
        timeline_len: usize,
    },
    /// Sent after every assistant message with that message's sources.
    SourcesChanged(Vec<SourceView>),
    BusyChanged(bool),
}

struct SessionState {
    timeline: Timeline,
    latest_sources: Vec<SourceView>,
}

/// One conversation with the retrieval backend.
///
/// Every timeline write for a request happens under the session lock together
/// with the matching controller transition, so a request's assistant turn is
/// always appended before the next request's user turn.
pub struct Session {
    controller: QueryController,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Arc<Self> {
        Self::with_options(backend, QueryOptions::default())
    }

    pub fn with_options(backend: Arc<dyn QueryBackend>, options: QueryOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            controller: QueryController::with_options(backend, options),
            inner: Mutex::new(SessionState {
                timeline: Timeline::new(),
                latest_sources: Vec::new(),
            }),
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn timeline(&self) -> Vec<Message> {
        self.lock().timeline.all().to_vec()
    }

    pub fn latest_sources(&self) -> Vec<SourceView> {
        self.lock().latest_sources.clone()
    }

    pub fn is_busy(&self) -> bool {
        let _state = self.lock();
        self.controller.is_pending()
    }

    /// Submits `input` and waits for its assistant turn. Returns `None` when
    /// the input was ignored (blank, or a query is already pending).
    ///
    /// Dropping the returned future before it resolves stops the query, as
    /// [`stop_query`](Self::stop_query) would.
    pub async fn submit_query(&self, input: &str) -> Option<QueryState> {
        let pending = {
            let mut state = self.lock();
            let pending = self.controller.begin(input)?;
            self.append(&mut state, Message::user(pending.query()));
            let _ = self.events.send(SessionEvent::BusyChanged(true));
            pending
        };
        let mut abandon = AbandonGuard {
            session: self,
            request: Some(pending.id()),
        };

        let outcome = pending.settle().await;

        let mut state = self.lock();
        let finished = self.controller.finish(pending.id());
        abandon.disarm();
        if !finished {
            debug!(request_id = %pending.id(), "session: request already reconciled by stop");
            return Some(QueryState::Cancelled);
        }
        let query_state = outcome.state();
        match outcome {
            QueryOutcome::Completed(response) => {
                self.append_assistant(&mut state, response.answer, response.sources);
            }
            QueryOutcome::Failed(_) => {
                self.append_assistant(&mut state, FAILED_CONTENT.to_string(), Vec::new());
            }
            QueryOutcome::Cancelled => {
                self.append_assistant(&mut state, STOPPED_CONTENT.to_string(), Vec::new());
            }
        }
        let _ = self.events.send(SessionEvent::BusyChanged(false));
        info!(request_id = %pending.id(), outcome = ?query_state, "session: query reconciled");
        Some(query_state)
    }

    /// Stops the pending query. Returns `false` when nothing was pending.
    pub fn stop_query(&self) -> bool {
        let mut state = self.lock();
        let Some(cancelled) = self.controller.cancel() else {
            return false;
        };
        self.append_stopped(&mut state, cancelled);
        true
    }

    fn append_stopped(&self, state: &mut SessionState, cancelled: CancelledQuery) {
        self.append_assistant(state, STOPPED_CONTENT.to_string(), Vec::new());
        let _ = self.events.send(SessionEvent::BusyChanged(false));
        info!(request_id = %cancelled.id, "session: query stopped");
    }

    fn append_assistant(&self, state: &mut SessionState, content: String, sources: Vec<Source>) {
        let views = normalize_sources(&sources);
        self.append(state, Message::assistant(content, sources));
        state.latest_sources = views.clone();
        let _ = self.events.send(SessionEvent::SourcesChanged(views));
    }

    fn append(&self, state: &mut SessionState, message: Message) {
        let timeline_len = state.timeline.append(message);
        if let Some(message) = state.timeline.last() {
            let _ = self.events.send(SessionEvent::MessageAppended {
                message: message.clone(),
                timeline_len,
            });
        }
    }
}

/// Stops the request of a `submit_query` future that is dropped before it
/// reconciles its outcome.
struct AbandonGuard<'a> {
    session: &'a Session,
    request: Option<RequestId>,
}

impl AbandonGuard<'_> {
    fn disarm(&mut self) {
        self.request = None;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let Some(id) = self.request.take() else {
            return;
        };
        let session = self.session;
        let mut state = session.lock();
        if let Some(cancelled) = session.controller.cancel_request(id) {
            debug!(request_id = %id, "session: submit dropped before its answer");
            session.append_stopped(&mut state, cancelled);
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
