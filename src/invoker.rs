// Token-aware API invoker with bounded retry
//
// One logical call runs as a loop over two phases: obtain a token when the
// current one is missing or expired, then perform the real request. Each
// attempt samples the clock once and uses that instant both for the expiry
// check and as the issue time of a freshly granted token. The attempt right
// after a successful grant always sends the real request, so a token that
// lapses during its own round trip cannot cause another grant.

use std::num::NonZeroU32;
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::api::ApiResult;
use crate::config::Credentials;
use crate::error::ApiError;
use crate::token::{Token, TokenGrant};
use crate::transport::{Clock, HttpRequest, HttpResponse, SystemClock, Transport, TransportError};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// How many attempts a phase may make before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    Unlimited,
    Attempts(NonZeroU32),
}

impl RetryLimit {
    /// `max_tries <= 0` means retry without limit. Larger counts than a `u32`
    /// holds are capped, never unlimited.
    pub fn from_max_tries(max_tries: i64) -> Self {
        if max_tries <= 0 {
            return Self::Unlimited;
        }
        let capped = u32::try_from(max_tries).unwrap_or(u32::MAX);
        NonZeroU32::new(capped).map_or(Self::Unlimited, Self::Attempts)
    }

    fn exhausted(&self, attempts: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Attempts(max) => attempts >= max.get(),
        }
    }
}

/// Where to send calls and how hard to try.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub credentials: Credentials,
    pub retry_limit: RetryLimit,
}

impl ApiSettings {
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }
}

/// One logical API call.
#[derive(Debug, Clone)]
pub struct ApiCall {
    /// Short name used in logs, e.g. "search Computers".
    pub operation: String,
    pub endpoint: String,
    pub method: Method,
    pub params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Grant,
    Request,
}

pub struct Invoker<T, C = SystemClock> {
    transport: T,
    clock: C,
    retry_delay: Duration,
}

impl<T: Transport, C: Clock> Invoker<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock, retry_delay: DEFAULT_RETRY_DELAY }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Perform `call`, acquiring a token into `token` first when needed.
    ///
    /// Transport failures and non-2xx responses are retried after a fixed
    /// delay. The grant phase and the request phase count attempts
    /// separately, so a slow token grant does not eat into the request's
    /// budget. A response with `success = false` is returned as-is.
    #[instrument(skip_all, fields(operation = %call.operation))]
    pub fn invoke(
        &self,
        settings: &ApiSettings,
        token: &mut Token,
        call: &ApiCall,
    ) -> Result<ApiResult, ApiError> {
        let mut grant_attempts = 0u32;
        let mut request_attempts = 0u32;
        let mut just_granted = false;

        loop {
            let started = self.clock.now();
            let use_token = std::mem::take(&mut just_granted) || token.is_valid_at(started);
            let (phase, attempt, request) = if use_token {
                request_attempts += 1;
                (Phase::Request, request_attempts, authorized_request(settings, token, call))
            } else {
                grant_attempts += 1;
                (Phase::Grant, grant_attempts, grant_request(settings))
            };
            debug!(
                ?phase,
                attempt,
                method = %request.method,
                url = %request.url,
                "sending request"
            );

            let failure = match self.transport.execute(&request) {
                Ok(response) if response.is_success() => match phase {
                    Phase::Request => return parse_result(&request.url, &response),
                    Phase::Grant => {
                        let grant = parse_grant(&response)?;
                        token.store(grant, started);
                        if !token.is_valid_at(started) {
                            return Err(ApiError::InvalidGrant(
                                "token expired at the moment it was issued".into(),
                            ));
                        }
                        info!(expires_at = ?token.expires_at(), "access token acquired");
                        grant_attempts = 0;
                        just_granted = true;
                        continue;
                    }
                },
                Ok(response) => {
                    ApiError::Http { status: response.status, description: response.description() }
                }
                Err(TransportError(message)) => {
                    ApiError::NoResponse { url: request.url.clone(), message }
                }
            };

            if settings.retry_limit.exhausted(attempt) {
                warn!(?phase, attempt, error = %failure, "giving up");
                return Err(failure);
            }
            warn!(
                ?phase,
                attempt,
                error = %failure,
                delay_secs = self.retry_delay.as_secs(),
                "request failed, retrying"
            );
            self.clock.sleep(self.retry_delay);
        }
    }
}

fn grant_request(settings: &ApiSettings) -> HttpRequest {
    HttpRequest {
        method: Method::POST,
        url: settings.url("token"),
        authorization: None,
        body: json!({
            "grant_type": "client_credentials",
            "client_id": settings.credentials.client_id(),
            "client_secret": settings.credentials.client_secret(),
        }),
    }
}

fn authorized_request(settings: &ApiSettings, token: &Token, call: &ApiCall) -> HttpRequest {
    HttpRequest {
        method: call.method.clone(),
        url: settings.url(&call.endpoint),
        authorization: token.authorization(),
        body: call.params.clone(),
    }
}

fn parse_grant(response: &HttpResponse) -> Result<TokenGrant, ApiError> {
    serde_json::from_str(&response.body)
        .map_err(|e| ApiError::InvalidGrant(format!("unreadable token response: {}", e)))
}

fn parse_result(url: &str, response: &HttpResponse) -> Result<ApiResult, ApiError> {
    serde_json::from_str(&response.body)
        .map_err(|e| ApiError::MalformedResponse { url: url.to_string(), message: e.to_string() })
}
