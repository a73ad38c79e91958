//! HTTP transport seam and reply normalization.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use shared::domain::RobotHost;

/// Method, path and optional JSON body for one request; built by a pure
/// per-trigger mapping function before any I/O happens.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// Every reply is normalized to this shape before reaching a mapping
/// function. `ok` reflects the HTTP status class only; a transport-level
/// failure arrives as `ok: false, status: 0` with a message body, so
/// callers never have to distinguish exceptions from rejections.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub ok: bool,
    pub status: u16,
    pub body: Value,
    pub host: RobotHost,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Infallible by contract: faults are encoded in the envelope.
    async fn execute(&self, host: &RobotHost, request: &RequestDescriptor) -> ResponseEnvelope;
}

pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn transport_failure(host: &RobotHost, message: String) -> ResponseEnvelope {
    ResponseEnvelope {
        ok: false,
        status: 0,
        body: json!({ "message": message }),
        host: host.clone(),
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, host: &RobotHost, request: &RequestDescriptor) -> ResponseEnvelope {
        let url = match host
            .base_url()
            .and_then(|base| base.join(&request.path))
        {
            Ok(url) => url,
            Err(err) => return transport_failure(host, format!("invalid robot url: {err}")),
        };

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let ok = response.status().is_success();
                // Empty or non-JSON bodies (e.g. bare 200 on DELETE) are
                // normalized to null rather than treated as faults.
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                ResponseEnvelope {
                    ok,
                    status,
                    body,
                    host: host.clone(),
                }
            }
            Err(err) => transport_failure(host, err.to_string()),
        }
    }
}
