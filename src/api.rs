// API client module: a small blocking client for the Alloy Navigator REST
// API. It owns the bearer token for the whole run so that a token fetched
// by the first search is reused by the attachment upload.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::invoker::{ApiCall, ApiSettings, Invoker};
use crate::token::Token;
use crate::transport::{Clock, ReqwestTransport, SystemClock, Transport};

/// Result envelope returned by every Alloy endpoint. Only `success` and the
/// first entry of `responseObject.Data` are interpreted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_code: Option<Value>,
    #[serde(default)]
    pub error_text: Option<String>,
    #[serde(default)]
    pub response_object: Option<Value>,
}

impl ApiResult {
    /// Turn `success = false` into [`ApiError::Rejected`].
    pub fn ensure_success(self) -> Result<Self, ApiError> {
        if self.success {
            return Ok(self);
        }
        let code = match &self.error_code {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "none".to_string(),
            Some(other) => other.to_string(),
        };
        let text = self.error_text.clone().unwrap_or_default();
        Err(ApiError::Rejected { code, text })
    }

    /// Id of the first record in `responseObject.Data`. A row is accepted
    /// too, in which case its first cell is the id.
    pub fn first_id(&self) -> Option<ObjectId> {
        let first = self.response_object.as_ref()?.get("Data")?.as_array()?.first()?;
        let cell = match first {
            Value::Array(row) => row.first()?,
            scalar => scalar,
        };
        ObjectId::from_value(cell)
    }
}

/// Identifier of a remote record as it appears in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// API client holding the invoker, the connection settings and the token
/// shared by every call of the run.
pub struct ApiClient<T = ReqwestTransport, C = SystemClock> {
    invoker: Invoker<T, C>,
    settings: ApiSettings,
    token: Token,
}

impl ApiClient {
    /// Create an ApiClient from the loaded configuration, using the real
    /// HTTP transport and the system clock.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let settings = config.api_settings().context("Incomplete API configuration")?;
        let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
        let invoker = Invoker::new(transport, SystemClock)
            .with_retry_delay(Duration::from_secs(config.api.retry_delay_secs));
        Ok(Self::new(invoker, settings))
    }
}

impl<T: Transport, C: Clock> ApiClient<T, C> {
    pub fn new(invoker: Invoker<T, C>, settings: ApiSettings) -> Self {
        Self { invoker, settings, token: Token::new() }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Run one call through the invoker with the client's token.
    pub fn call(&mut self, call: &ApiCall) -> Result<ApiResult, ApiError> {
        self.invoker.invoke(&self.settings, &mut self.token, call)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> ApiResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn first_id_reads_scalar_ids() {
        let result = parse(json!({ "success": true, "responseObject": { "Data": [42, 17] } }));
        assert_eq!(result.first_id(), Some(ObjectId::new("42")));
    }

    #[test]
    fn first_id_reads_first_cell_of_a_row() {
        let result =
            parse(json!({ "success": true, "responseObject": { "Data": [["CMP0009", "x"]] } }));
        assert_eq!(result.first_id(), Some(ObjectId::new("CMP0009")));
    }

    #[test]
    fn first_id_is_none_for_empty_or_missing_data() {
        assert_eq!(
            parse(json!({ "success": true, "responseObject": { "Data": [] } })).first_id(),
            None
        );
        assert_eq!(parse(json!({ "success": true })).first_id(), None);
        assert_eq!(
            parse(json!({ "success": true, "responseObject": { "Data": [null] } })).first_id(),
            None
        );
    }

    #[test]
    fn ensure_success_carries_code_and_text() {
        let result = parse(json!({ "success": false, "errorCode": 401, "errorText": "denied" }));
        match result.ensure_success() {
            Err(ApiError::Rejected { code, text }) => {
                assert_eq!(code, "401");
                assert_eq!(text, "denied");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn missing_success_flag_counts_as_failure() {
        assert!(parse(json!({})).ensure_success().is_err());
    }
}
