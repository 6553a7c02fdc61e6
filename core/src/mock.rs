//! Scripted transport for tests.
//!
//! Every call is recorded, so tests can assert how many dispatches happened
//! and what was sent, and whether an in-flight call was dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{HttpTransport, TransportError};

/// What a `MockTransport` answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(HttpResponse),
    NoResponse,
    Error(TransportError),
    /// Never completes; the call only ends by being dropped.
    Pending,
}

/// An `HttpTransport` that replays one scripted reply.
#[derive(Debug)]
pub struct MockTransport {
    reply: MockReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
    aborted: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn respond(status: u16, body: &str) -> Self {
        Self::new(MockReply::Response(HttpResponse::new(status, body)))
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(MockReply::Response(HttpResponse::new(status, body.to_string())))
    }

    pub fn no_response() -> Self {
        Self::new(MockReply::NoResponse)
    }

    pub fn failing(error: TransportError) -> Self {
        Self::new(MockReply::Error(error))
    }

    pub fn pending() -> Self {
        Self::new(MockReply::Pending)
    }

    /// Number of `send` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    /// True once a `send` future was dropped before it completed.
    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Flags the transport as aborted if dropped before `disarm`.
struct AbortProbe {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for AbortProbe {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<Option<HttpResponse>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let mut probe = AbortProbe {
            flag: Arc::clone(&self.aborted),
            armed: true,
        };
        // Yield once so callers get a chance to cancel before the reply.
        tokio::task::yield_now().await;
        let outcome = match &self.reply {
            MockReply::Response(response) => Ok(Some(response.clone())),
            MockReply::NoResponse => Ok(None),
            MockReply::Error(error) => Err(error.clone()),
            MockReply::Pending => std::future::pending().await,
        };
        probe.armed = false;
        outcome
    }
}
