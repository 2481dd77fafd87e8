//! Scripted transport
//!
//! Responses are produced by a closure over the incoming request so tests can
//! answer based on headers (e.g. reject every token but `at2`). Every request
//! is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tether_core::Transport;
use tether_domain::{ApiResponse, TransportFailure, TransportRequest};

type Responder =
    Box<dyn Fn(&TransportRequest, usize) -> Result<ApiResponse, TransportFailure> + Send + Sync>;

pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl MockTransport {
    /// Answer with `responder(request, call_index)`
    pub fn new(
        responder: impl Fn(&TransportRequest, usize) -> Result<ApiResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// Answer every request with the same status and body
    pub fn always(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_, _| Ok(ApiResponse::new(status, body.clone())))
    }

    /// Answer requests in order, repeating the last response
    pub fn sequence(responses: Vec<Result<ApiResponse, TransportFailure>>) -> Self {
        let script = Mutex::new(VecDeque::from(responses));
        Self::new(move |_, _| {
            let mut script = script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(Err(TransportFailure::Other("empty".into())))
            }
        })
    }

    /// 200 with `body` for requests bearing `token`, 401 otherwise
    pub fn accepting_token(token: &str, body: &str) -> Self {
        let expected = format!("Bearer {token}");
        let body = body.to_string();
        Self::new(move |request, _| {
            if request.header("authorization") == Some(expected.as_str()) {
                Ok(ApiResponse::new(200, body.clone()))
            } else {
                Ok(ApiResponse::new(401, r#"{"message":"Token expired"}"#))
            }
        })
    }

    /// Delay every response so concurrent callers overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        (self.responder)(&request, index)
    }
}
