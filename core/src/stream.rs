//! Single-event push streams with an explicit delivery context.
//!
//! # Design
//! A `Publisher` wraps a not-yet-polled future. Activating it spawns one Tokio
//! task that dispatches the transport call and does all classification and
//! decoding off the caller's context. The single terminal event then goes
//! either to a `DeliveryContext` (`subscribe`) or through a one-slot channel
//! to whoever polls the returned `EventStream` (`into_stream`).
//!
//! Cancelling a `Subscription`, or dropping it or the `EventStream`, aborts the
//! task, which drops the in-flight transport future. An event that was already
//! computed but not yet delivered is discarded.
//!
//! Activating a publisher outside a Tokio runtime dispatches nothing; the
//! single event is a `Transport` error instead.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use futures::future::BoxFuture;
use futures::Stream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::NetworkError;
use crate::transport::TransportError;

/// A unit of work handed to a `DeliveryContext`.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where stream events are delivered.
pub trait DeliveryContext: Send + Sync {
    fn deliver(&self, job: Job);
}

/// Runs jobs immediately on the producing task.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl DeliveryContext for InlineContext {
    fn deliver(&self, job: Job) {
        job();
    }
}

/// A dedicated serial thread, the designated context for UI-style consumers.
///
/// Jobs run one at a time in submission order. The thread exits once every
/// handle to the context is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct MainContext {
    jobs: mpsc::UnboundedSender<Job>,
}

impl MainContext {
    pub const THREAD_NAME: &'static str = "netkit-main";

    pub fn spawn() -> io::Result<Self> {
        Self::spawn_named(Self::THREAD_NAME)
    }

    pub fn spawn_named(name: &str) -> io::Result<Self> {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Some(job) = queue.blocking_recv() {
                job();
            }
        })?;
        Ok(Self { jobs })
    }
}

impl DeliveryContext for MainContext {
    fn deliver(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            tracing::warn!("main context thread is gone; dropping event");
        }
    }
}

/// A lazy request that emits exactly one `Result` once activated.
#[must_use = "publishers do nothing until subscribed"]
pub struct Publisher<T> {
    work: BoxFuture<'static, Result<T, NetworkError>>,
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Publisher<T> {
    pub(crate) fn new(work: BoxFuture<'static, Result<T, NetworkError>>) -> Self {
        Self { work }
    }

    /// Activate the request and deliver its event to `sink` on `context`.
    pub fn subscribe<F>(self, context: Arc<dyn DeliveryContext>, sink: F) -> Subscription
    where
        F: FnOnce(Result<T, NetworkError>) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let Some(runtime) = current_runtime() else {
            context.deliver(Box::new(move || sink(Err(no_runtime()))));
            return Subscription { cancelled, task: None };
        };
        let flag = Arc::clone(&cancelled);
        let task = runtime.spawn(async move {
            let event = self.work.await;
            if flag.load(Ordering::Acquire) {
                return;
            }
            context.deliver(Box::new(move || {
                if !flag.load(Ordering::Acquire) {
                    sink(event);
                }
            }));
        });
        Subscription {
            cancelled,
            task: Some(task.abort_handle()),
        }
    }

    /// Activate the request and receive its event through a stream that
    /// yields one item and then ends.
    pub fn into_stream(self) -> EventStream<T> {
        let (tx, rx) = mpsc::channel(1);
        let task = match current_runtime() {
            Some(runtime) => {
                let task = runtime.spawn(async move {
                    let event = self.work.await;
                    let _ = tx.send(event).await;
                });
                Some(task.abort_handle())
            }
            None => {
                let _ = tx.try_send(Err(no_runtime()));
                None
            }
        };
        EventStream { events: rx, task }
    }
}

fn current_runtime() -> Option<Handle> {
    let runtime = Handle::try_current().ok();
    if runtime.is_none() {
        tracing::error!("publisher activated outside a Tokio runtime; nothing was sent");
    }
    runtime
}

fn no_runtime() -> NetworkError {
    NetworkError::Transport(TransportError::Other("no async runtime".to_string()))
}

/// Handle to an active subscription. Dropping it cancels.
#[derive(Debug)]
#[must_use = "dropping a subscription cancels it"]
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

impl Subscription {
    /// Abort the in-flight request and suppress its event.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True once the background task has finished or been aborted.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(AbortHandle::is_finished)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Receiving end of `Publisher::into_stream`.
#[derive(Debug)]
pub struct EventStream<T> {
    events: mpsc::Receiver<Result<T, NetworkError>>,
    task: Option<AbortHandle>,
}

impl<T> Unpin for EventStream<T> {}

impl<T> Stream for EventStream<T> {
    type Item = Result<T, NetworkError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::client::RequestPipeline;
    use crate::decoder::JsonDecoder;
    use crate::http::HttpMethod;
    use crate::mock::MockTransport;
    use crate::transport::TransportError;
    use crate::types::{EmptyResponse, Headers};

    #[derive(Debug, PartialEq, Deserialize)]
    struct Greeting {
        text: String,
    }

    fn pipeline(transport: &Arc<MockTransport>) -> RequestPipeline {
        RequestPipeline::with_diagnostics(transport.clone())
    }

    #[tokio::test]
    async fn publisher_is_lazy() {
        let transport = Arc::new(MockTransport::json(200, &json!({"text": "hi"})));
        let publisher = pipeline(&transport).publisher::<Greeting, _>(
            HttpMethod::Get,
            JsonDecoder::new(),
            "http://localhost:3000/greeting",
            Headers::new(),
            None,
        );
        tokio::task::yield_now().await;
        assert_eq!(transport.calls(), 0);
        drop(publisher);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn subscribe_delivers_on_main_context() {
        let transport = Arc::new(MockTransport::json(200, &json!({"text": "hi"})));
        let main: Arc<dyn DeliveryContext> = Arc::new(MainContext::spawn().unwrap());
        let (tx, rx) = oneshot::channel();

        let _subscription = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/greeting",
                Headers::new(),
                None,
            )
            .subscribe(main, move |event| {
                let thread = std::thread::current().name().map(str::to_string);
                let _ = tx.send((event, thread));
            });

        let (event, thread) = rx.await.unwrap();
        assert_eq!(event.unwrap(), Greeting { text: "hi".to_string() });
        assert_eq!(thread.as_deref(), Some(MainContext::THREAD_NAME));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn stream_uses_json_in_body() {
        let transport = Arc::new(MockTransport::respond(204, ""));
        let mut params = crate::types::Params::new();
        params.insert("a".to_string(), "1".into());
        let mut events = pipeline(&transport)
            .publisher_empty(
                HttpMethod::Post,
                JsonDecoder::new(),
                "http://localhost:3000/items",
                Headers::new(),
                Some(params),
            )
            .into_stream();

        assert_eq!(events.next().await, Some(Ok(EmptyResponse)));
        assert_eq!(events.next().await, None);
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.body.as_deref(), Some(r#"{"a":"1"}"#));
    }

    #[tokio::test]
    async fn errors_terminate_the_stream() {
        let transport = Arc::new(MockTransport::failing(TransportError::NotConnected));
        let mut events = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/greeting",
                Headers::new(),
                None,
            )
            .into_stream();

        assert!(matches!(events.next().await, Some(Err(NetworkError::NoInternet(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn invalid_url_is_emitted_as_error_without_dispatch() {
        let transport = Arc::new(MockTransport::respond(200, "{}"));
        let mut events = pipeline(&transport)
            .publisher::<Greeting, _>(HttpMethod::Get, JsonDecoder::new(), "::", Headers::new(), None)
            .into_stream();
        assert_eq!(events.next().await, Some(Err(NetworkError::InvalidUrl)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn cancel_aborts_transport_and_suppresses_event() {
        let transport = Arc::new(MockTransport::pending());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/slow",
                Headers::new(),
                None,
            )
            .subscribe(Arc::new(InlineContext), move |event| {
                let _ = tx.send(event);
            });

        while transport.calls() == 0 {
            tokio::task::yield_now().await;
        }
        drop(subscription);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !transport.aborted() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_event_stream_aborts_transport() {
        let transport = Arc::new(MockTransport::pending());
        let events = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/slow",
                Headers::new(),
                None,
            )
            .into_stream();

        while transport.calls() == 0 {
            tokio::task::yield_now().await;
        }
        drop(events);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !transport.aborted() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn subscribe_outside_runtime_emits_error_without_dispatch() {
        let transport = Arc::new(MockTransport::json(200, &json!({"text": "hi"})));
        let event = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&event);

        let subscription = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/greeting",
                Headers::new(),
                None,
            )
            .subscribe(Arc::new(InlineContext), move |result| {
                *slot.lock().unwrap() = Some(result);
            });

        assert!(subscription.is_finished());
        assert_eq!(
            event.lock().unwrap().take(),
            Some(Err(NetworkError::Transport(TransportError::Other("no async runtime".to_string()))))
        );
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn stream_outside_runtime_yields_one_error() {
        let transport = Arc::new(MockTransport::json(200, &json!({"text": "hi"})));
        let mut events = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/greeting",
                Headers::new(),
                None,
            )
            .into_stream();

        let first = futures::executor::block_on(events.next());
        assert!(matches!(first, Some(Err(NetworkError::Transport(_)))));
        assert!(futures::executor::block_on(events.next()).is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_event_is_not_delivered_from_queue() {
        let (tx, rx) = std::sync::mpsc::channel::<Job>();
        struct Queue(std::sync::Mutex<std::sync::mpsc::Sender<Job>>);
        impl DeliveryContext for Queue {
            fn deliver(&self, job: Job) {
                let _ = self.0.lock().unwrap().send(job);
            }
        }

        let transport = Arc::new(MockTransport::json(200, &json!({"text": "late"})));
        let delivered = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&delivered);
        let subscription = pipeline(&transport)
            .publisher::<Greeting, _>(
                HttpMethod::Get,
                JsonDecoder::new(),
                "http://localhost:3000/greeting",
                Headers::new(),
                None,
            )
            .subscribe(Arc::new(Queue(std::sync::Mutex::new(tx))), move |_| {
                seen.store(true, Ordering::SeqCst);
            });

        while !subscription.is_finished() {
            tokio::task::yield_now().await;
        }
        subscription.cancel();
        assert!(subscription.is_cancelled());

        let job = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        job();
        assert!(!delivered.load(Ordering::SeqCst));
    }
}
