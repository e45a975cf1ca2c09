//! In-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{Method, Transport};

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub params: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, body: Value) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn push_err(&self, err: TransportError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: Option<&Value>,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            params: params.cloned(),
            headers: headers.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::EmptyBody))
    }
}
