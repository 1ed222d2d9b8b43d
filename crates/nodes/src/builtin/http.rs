//! `http`: outbound HTTP request built from the node's parameters.
//!
//! Parameters (all may contain placeholders resolved against the inputs):
//!
//! | field     | default | notes                                              |
//! |-----------|---------|----------------------------------------------------|
//! | `method`  | `GET`   | upper-cased                                        |
//! | `url`     | -       | required; empty after resolution is rejected       |
//! | `headers` | `{}`    | object; non-string values are sent as their text   |
//! | `body`    | none    | sent as JSON; a string holding JSON is sent parsed |
//!
//! The response body is returned as JSON when it parses, otherwise as text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::placeholder::{display_string, resolve};
use crate::traits::{ExecutableNode, ExecutionContext, NodeMeta};
use crate::NodeError;

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Resolve placeholders in `params` and validate the result.
    ///
    /// Performs no I/O.
    pub fn from_params(params: &Value, inputs: &[Value]) -> Result<Self, NodeError> {
        let method = match params.get("method").map(|m| resolve(m, inputs)) {
            None | Some(Value::Null) => "GET".to_owned(),
            Some(Value::String(s)) if s.trim().is_empty() => "GET".to_owned(),
            Some(other) => display_string(&other).trim().to_uppercase(),
        };
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| NodeError::validation(format!("invalid HTTP method '{method}'")))?;

        let url = params
            .get("url")
            .map(|u| display_string(&resolve(u, inputs)))
            .unwrap_or_default();
        let url = url.trim().to_owned();
        if url.is_empty() {
            return Err(NodeError::validation("http node missing 'url'"));
        }

        let headers = match params.get("headers").map(|h| resolve(h, inputs)) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), display_string(v)))
                .collect(),
            Some(_) => return Err(NodeError::validation("http node 'headers' must be an object")),
        };

        let body = match params.get("body").map(|b| resolve(b, inputs)) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(parsed) => Some(parsed),
                Err(_) => Some(Value::String(text)),
            },
            Some(other) => Some(other),
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Issues one HTTP request per execution, bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct HttpNode {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpNode {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    /// Use a pre-configured client (proxies, TLS roots, ...).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ExecutableNode for HttpNode {
    async fn execute(
        &self,
        params: &Value,
        inputs: &[Value],
        _ctx: &ExecutionContext,
        meta: &NodeMeta,
    ) -> Result<Value, NodeError> {
        let request = HttpRequest::from_params(params, inputs)?;
        debug!(
            "node '{}' sending {} {}",
            meta.node_id, request.method, request.url
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                NodeError::validation(format!("invalid request to '{}': {e}", request.url))
            } else if e.is_timeout() {
                NodeError::execution_with(
                    format!("{} {} timed out after {:?}", request.method, request.url, self.timeout),
                    e,
                )
            } else {
                NodeError::execution_with(format!("{} {} failed", request.method, request.url), e)
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::execution_with("failed to read response body", e))?;
        debug!("node '{}' received HTTP {}", meta.node_id, status.as_u16());

        Ok(match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(text),
        })
    }
}
