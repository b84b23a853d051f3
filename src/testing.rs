// Scripted transport and fake clock shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Credentials;
use crate::invoker::{ApiSettings, RetryLimit};
use crate::transport::{Clock, HttpRequest, HttpResponse, Transport, TransportError};

pub const BASE_URL: &str = "https://alloy.test/api";

type Handler = Box<dyn FnMut(&HttpRequest) -> Result<HttpResponse, TransportError>>;

/// Answers each request with a closure and records every request it sees.
pub struct MockTransport {
    handler: RefCell<Handler>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(
        handler: impl FnMut(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static,
    ) -> Self {
        Self { handler: RefCell::new(Box::new(handler)), requests: RefCell::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }

    pub fn count_to(&self, endpoint: &str) -> usize {
        let url = format!("{}/{}", BASE_URL, endpoint);
        self.requests.borrow().iter().filter(|r| r.url == url).count()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        (self.handler.borrow_mut())(request)
    }
}

/// Clock that only moves when told to or when slept on.
pub struct FakeClock {
    now: Cell<u64>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn at(now: u64) -> Self {
        Self { now: Cell::new(now), sleeps: RefCell::new(Vec::new()) }
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.now.set(self.now.get() + duration.as_secs());
    }
}

pub fn settings(max_tries: i64) -> ApiSettings {
    ApiSettings {
        base_url: BASE_URL.to_string(),
        credentials: Credentials::new("client", "secret"),
        retry_limit: RetryLimit::from_max_tries(max_tries),
    }
}

pub fn is_grant(request: &HttpRequest) -> bool {
    request.url == format!("{}/token", BASE_URL)
}

pub fn grant_response(expires_in: u64) -> HttpResponse {
    ok_json(json!({
        "access_token": "tok-1",
        "token_type": "Bearer",
        "expires_in": expires_in,
    }))
}

pub fn ok_json(body: Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

pub fn data(ids: Value) -> HttpResponse {
    ok_json(json!({
        "success": true,
        "errorCode": 0,
        "errorText": "",
        "responseObject": { "Data": ids },
    }))
}

pub fn refused() -> Result<HttpResponse, TransportError> {
    Err(TransportError("connection refused".into()))
}

/// Log sink for asserting on formatted `tracing` output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Run `f` with a subscriber writing INFO and above into this buffer.
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
