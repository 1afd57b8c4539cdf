use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Instant;

use crate::errors::DispatchError;

use super::Action;

const ACTION: &str = "http_request";

/// Action responsible for `http_request(method, url)`.
///
/// Returns `{ "status": <u16>, "body": <json or text> }`. A non-2xx status
/// is reported as a dispatch failure.
pub struct HttpRequestAction {
    client: Client,
}

impl HttpRequestAction {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn string_arg<'a>(args: &'a [Value], index: usize, label: &str) -> Result<&'a str, DispatchError> {
        args.get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::invalid_argument(ACTION, format!("'{}' must be a string", label)))
    }
}

impl Default for HttpRequestAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for HttpRequestAction {
    fn arity(&self) -> usize {
        2
    }

    #[tracing::instrument(name = "http_action", skip_all)]
    async fn call(&self, args: Vec<Value>) -> Result<Value, DispatchError> {
        let start_time = Instant::now();

        let method_str = Self::string_arg(&args, 0, "method")?;
        let url = Self::string_arg(&args, 1, "url")?;

        let method = Method::from_bytes(method_str.to_uppercase().as_bytes())
            .map_err(|e| DispatchError::invalid_argument(ACTION, format!("invalid HTTP method: {}", e)))?;

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "HTTP request failed");
                DispatchError::failed(ACTION, e.to_string())
            })?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to read HTTP response body");
            DispatchError::failed(ACTION, format!("failed to read response body: {}", e))
        })?;
        let body = serde_json::from_str(&raw_body).unwrap_or(Value::String(raw_body));
        let duration = start_time.elapsed().as_millis() as u64;

        tracing::info!(method = %method_str, %url, status = status.as_u16(), duration_ms = duration, "HTTP action finished");

        if !status.is_success() {
            return Err(DispatchError::failed(
                ACTION,
                format!("{} {} returned status {}", method_str, url, status.as_u16()),
            ));
        }

        Ok(json!({ "status": status.as_u16(), "body": body }))
    }
}
