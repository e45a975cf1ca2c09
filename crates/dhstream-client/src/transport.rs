//! HTTP transport for the action endpoints.
//!
//! [`Transport`] is the seam between the API client and the network. The
//! production implementation is [`HttpTransport`] (reqwest); tests plug in
//! an in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::TransportError;

/// HTTP methods used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A generic request/response exchange returning the decoded JSON body.
///
/// `params` become the query string for GET and the JSON body for POST.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: Option<&Value>,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: Option<&Value>,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError> {
        (**self).request(method, url, params, headers).await
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    inner: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default reqwest client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a preconfigured reqwest client.
    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: Option<&Value>,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let mut target =
            Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut builder = match method {
            Method::Get => {
                if let Some(params) = params {
                    let pairs = query_pairs(params);
                    if !pairs.is_empty() {
                        target.query_pairs_mut().extend_pairs(pairs);
                    }
                }
                debug!(url = %target, "GET request");
                self.inner.get(target.clone())
            }
            Method::Post => {
                let body = match params {
                    Some(params) => serde_json::to_vec(params)?,
                    None => b"{}".to_vec(),
                };
                debug!(url = %target, body_len = body.len(), "POST request");
                self.inner.post(target.clone()).body(body)
            }
        };

        let mut has_content_type = false;
        for (name, value) in headers {
            has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !has_content_type {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        let response = builder.send().await.map_err(|e| {
            error!(url = %target, error = %e, "Request failed");
            TransportError::Connection(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(url = %target, status = status.as_u16(), "Non-success response");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }

        debug!(url = %target, status = status.as_u16(), "Response received");
        Ok(serde_json::from_str(&text)?)
    }
}

/// Flatten a JSON object into query pairs. Strings are sent bare, nulls
/// are dropped, anything else is sent as its JSON text.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let empty = Map::new();
    let object = params.as_object().unwrap_or(&empty);
    object
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}
