//! Scripted in-process backends shared by the state machine tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{QueryRequest, QueryResponse, Source},
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    transport::{HttpBackend, QueryBackend},
};

pub(crate) struct Reply {
    result: Result<QueryResponse, TransportError>,
    gate: Option<Arc<Notify>>,
    honor_cancel: bool,
}

impl Reply {
    pub(crate) fn answer(response: QueryResponse) -> Self {
        Self {
            result: Ok(response),
            gate: None,
            honor_cancel: true,
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Self {
            result: Err(TransportError::Status {
                endpoint: "http://backend.test/query".into(),
                status,
                detail: ApiError::new(ErrorCode::from_status(status), "backend exploded"),
            }),
            gate: None,
            honor_cancel: true,
        }
    }

    /// Holds the reply until `gate` is notified.
    pub(crate) fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    /// Keeps waiting on the gate even after cancellation, like a transport
    /// that delivers a response in the same tick as the cancel.
    pub(crate) fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryResponse, TransportError> {
        self.requests.lock().expect("requests lock").push(request);
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .expect("query was not scripted");

        if let Some(gate) = reply.gate {
            if reply.honor_cancel {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    _ = gate.notified() => {}
                }
            } else {
                gate.notified().await;
            }
        }
        reply.result
    }
}

pub(crate) fn response(answer: &str, sources: Vec<Source>) -> QueryResponse {
    QueryResponse {
        answer: answer.to_string(),
        sources,
    }
}

pub(crate) fn source(chunk_id: &str, title: &str) -> Source {
    Source {
        chunk_id: Some(chunk_id.to_string()),
        title: Some(title.to_string()),
        text: "...".to_string(),
        ..Source::default()
    }
}

/// Polls `condition` until it holds, failing the test after a generous bound.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Serves `app` on an ephemeral local port and returns its base url.
pub(crate) async fn spawn_backend(app: axum::Router) -> std::io::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

/// An [`HttpBackend`] whose client ignores proxy settings from the
/// environment, so requests to local test servers always go direct.
pub(crate) fn local_backend(server_url: impl Into<String>) -> HttpBackend {
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build http client");
    HttpBackend::with_client(server_url, http)
}
