//! Downstream dispatch: the send capability and the fire-and-forget pool.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::observability::events;

const COMPONENT: &str = "dispatch";

/// One payload to be posted to a resolved actor URL.
#[derive(Clone, Debug)]
pub struct DispatchRequest {
    /// Exchange label for log correlation.
    pub exchange: &'static str,
    pub base_url: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub correlation_id: String,
}

impl DispatchRequest {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }
}

/// Failures of a single dispatch attempt.
#[derive(Debug)]
pub enum DispatchError {
    /// The target answered with a non-success status.
    Rejected { status: u16 },
    /// Connect, TLS, or timeout failure before any status arrived.
    Transport(reqwest::Error),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Rejected { status } => {
                write!(f, "target rejected dispatch with status {status}")
            }
            DispatchError::Transport(err) => write!(f, "dispatch transport failure: {err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Transport(err) => Some(err),
            DispatchError::Rejected { .. } => None,
        }
    }
}

/// Capability to send one payload to one resolved URL. Orchestrators never
/// name a concrete HTTP client.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError>;
}

/// reqwest-backed dispatcher. The deployment timeout is baked into the
/// client, bounding how long any attempt is kept alive before being
/// abandoned.
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        let mut http = self
            .client
            .post(request.url())
            .header("Content-Type", "application/json");
        for (name, value) in &request.headers {
            http = http.header(name, value);
        }
        let response = http
            .body(request.body.clone())
            .send()
            .await
            .map_err(DispatchError::Transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// Bounded fire-and-forget worker pool.
///
/// Admitted requests are queued and sent by detached workers; each send's
/// outcome is consumed only by the logging sink, never awaited by the code
/// path that already acknowledged the caller. A full queue drops the forward
/// with a logged warning — dropped forwards are not retried.
#[derive(Clone)]
pub struct DispatchPool {
    sender: Sender<DispatchRequest>,
}

impl DispatchPool {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, workers: usize, queue_size: usize) -> Self {
        let (sender, receiver) = channel(queue_size.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        for worker_index in 0..workers.max(1) {
            let worker_id = format!("dispatch-{worker_index}");
            tokio::spawn(Self::dispatch_loop(
                worker_id,
                dispatcher.clone(),
                receiver.clone(),
            ));
        }
        Self { sender }
    }

    async fn dispatch_loop(
        worker_id: String,
        dispatcher: Arc<dyn Dispatcher>,
        receiver: Arc<Mutex<Receiver<DispatchRequest>>>,
    ) {
        loop {
            let request = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            let Some(request) = request else {
                info!(
                    event = events::DISPATCH_QUEUE_CLOSED,
                    component = COMPONENT,
                    worker_id = worker_id.as_str(),
                    "queue closed; stopping dispatch loop"
                );
                break;
            };

            debug!(
                event = events::DISPATCH_ATTEMPT,
                component = COMPONENT,
                worker_id = worker_id.as_str(),
                exchange = request.exchange,
                correlation_id = request.correlation_id.as_str(),
                url = request.url().as_str(),
                "attempting downstream dispatch"
            );

            match dispatcher.dispatch(&request).await {
                Ok(()) => debug!(
                    event = events::DISPATCH_OK,
                    component = COMPONENT,
                    worker_id = worker_id.as_str(),
                    exchange = request.exchange,
                    correlation_id = request.correlation_id.as_str(),
                    "downstream dispatch succeeded"
                ),
                Err(err) => warn!(
                    event = events::DISPATCH_FAILED,
                    component = COMPONENT,
                    worker_id = worker_id.as_str(),
                    exchange = request.exchange,
                    correlation_id = request.correlation_id.as_str(),
                    err = %err,
                    "downstream dispatch failed; not retried"
                ),
            }
        }
    }

    /// Enqueues one forward without waiting for its outcome.
    pub fn submit(&self, request: DispatchRequest) {
        match self.sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => warn!(
                event = events::DISPATCH_QUEUE_FULL,
                component = COMPONENT,
                exchange = request.exchange,
                correlation_id = request.correlation_id.as_str(),
                "dispatch queue full; forward dropped"
            ),
            Err(TrySendError::Closed(request)) => warn!(
                event = events::DISPATCH_QUEUE_CLOSED,
                component = COMPONENT,
                exchange = request.exchange,
                correlation_id = request.correlation_id.as_str(),
                "dispatch queue closed; forward dropped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchError, DispatchPool, DispatchRequest, Dispatcher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingDispatcher {
        sent: AtomicUsize,
    }

    impl CountingDispatcher {
        fn sent(&self) -> usize {
            self.sent.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Dispatcher for CountingDispatcher {
        async fn dispatch(&self, _request: &DispatchRequest) -> Result<(), DispatchError> {
            self.sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn request(correlation_id: &str) -> DispatchRequest {
        DispatchRequest {
            exchange: "care-contexts-discover",
            base_url: "https://hip-9.example/".to_string(),
            path: "/v0.5/care-contexts/discover".to_string(),
            headers: Vec::new(),
            body: "{}".to_string(),
            correlation_id: correlation_id.to_string(),
        }
    }

    async fn eventually(predicate: impl Fn() -> bool) {
        for _ in 0..200 {
            if predicate() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        assert_eq!(
            request("corr-1").url(),
            "https://hip-9.example/v0.5/care-contexts/discover"
        );
    }

    #[tokio::test]
    async fn submitted_requests_reach_the_dispatcher() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let pool = DispatchPool::new(dispatcher.clone(), 2, 8);

        pool.submit(request("corr-1"));
        pool.submit(request("corr-2"));

        eventually(|| dispatcher.sent() == 2).await;
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        struct StalledDispatcher;

        #[async_trait]
        impl Dispatcher for StalledDispatcher {
            async fn dispatch(&self, _request: &DispatchRequest) -> Result<(), DispatchError> {
                std::future::pending().await
            }
        }

        let pool = DispatchPool::new(Arc::new(StalledDispatcher), 1, 1);
        // One request stalls in the worker, one fills the queue slot, the
        // rest must drop without blocking the submitter.
        for index in 0..8 {
            pool.submit(request(&format!("corr-{index}")));
        }
    }
}
