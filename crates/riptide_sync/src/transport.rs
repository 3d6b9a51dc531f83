//! HTTP client abstraction.
//!
//! The sync engine only ever POSTs JSON bodies and reads status + body
//! back, so the transport seam is a single-method trait. Implement it
//! over whatever HTTP stack the host platform provides; tests use
//! [`MockHttpClient`] or an in-process fake server.

use crate::error::SyncError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Default request deadline: enough time to move a few megabytes over a
/// slow link.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A response from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a 200 response with the given body.
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Creates a non-200 response with a text body.
    #[must_use]
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into().into_bytes(),
        }
    }
}

/// Transport-level failures, before any HTTP status exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The deadline elapsed.
    Timeout,
    /// DNS, connection, or I/O failure.
    Network(String),
}

impl From<HttpError> for SyncError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout => SyncError::Timeout,
            HttpError::Network(message) => SyncError::Network(message),
        }
    }
}

/// The transport seam.
///
/// A non-200 status is not an `Err`: the engine needs the status and
/// body to decide what to do. Only failures that prevented a response
/// from existing at all come back as [`HttpError`].
pub trait HttpClient: Send + Sync {
    /// POSTs `body` to `url` with the given `Authorization` header
    /// value, honoring `timeout`.
    fn post(
        &self,
        url: &str,
        auth: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError>;
}

/// A scripted client for unit tests.
///
/// Responses are consumed in FIFO order; requests are recorded so tests
/// can assert on what was sent.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A request captured by [`MockHttpClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Target URL.
    pub url: String,
    /// Authorization header value.
    pub auth: String,
    /// Request body.
    pub body: Vec<u8>,
}

impl MockHttpClient {
    /// Creates a client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn enqueue(&self, response: Result<HttpResponse, HttpError>) {
        self.responses.lock().push_back(response);
    }

    /// Queues a 200 response with a JSON body.
    pub fn enqueue_json(&self, body: &impl serde::Serialize) {
        let bytes = serde_json::to_vec(body).unwrap();
        self.enqueue(Ok(HttpResponse::ok(bytes)));
    }

    /// Returns the requests made so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl HttpClient for MockHttpClient {
    fn post(
        &self,
        url: &str,
        auth: &str,
        body: Vec<u8>,
        _timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            auth: auth.to_string(),
            body,
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::Network("no scripted response".into())))
    }
}
