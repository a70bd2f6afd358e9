//! The seam between the pipeline and the network.
//!
//! # Design
//! `Transport` takes an encoded request and reports what happened as a
//! `TransportResponse`; it never fails in the `Result` sense because a
//! transport error is just one more fault for the executor to classify.
//! Cancellation is best effort: the executor drops the returned future.
//!
//! `UreqTransport` is the default implementation. ureq is blocking, so each
//! call runs on Tokio's blocking pool and a dropped future simply discards
//! the eventual result.

use std::io;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{TransportRequest, TransportResponse};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: TransportRequest) -> TransportResponse;
}

/// Transport backed by a ureq agent configured with the request's timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: TransportRequest) -> TransportResponse {
        match tokio::task::spawn_blocking(move || execute_blocking(request)).await {
            Ok(response) => response,
            Err(e) => TransportResponse::failed(TransportError::Other(e.to_string())),
        }
    }
}

/// Execute `request` using ureq and translate the outcome.
///
/// ureq's status-code-as-error behaviour is disabled so 4xx/5xx responses
/// come back as data for the executor to classify.
fn execute_blocking(request: TransportRequest) -> TransportResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(request.timeout))
        .build()
        .new_agent();

    let url = request.url.as_str();
    let result = match (request.method, request.body.as_deref()) {
        ("GET", _) => with_headers(agent.get(url), &request).call(),
        ("HEAD", _) => with_headers(agent.head(url), &request).call(),
        ("DELETE", _) => with_headers(agent.delete(url), &request).call(),
        ("POST", Some(body)) => with_headers(agent.post(url), &request).send(body),
        ("POST", None) => with_headers(agent.post(url), &request).send_empty(),
        ("PUT", Some(body)) => with_headers(agent.put(url), &request).send(body),
        ("PUT", None) => with_headers(agent.put(url), &request).send_empty(),
        (other, _) => {
            return TransportResponse::failed(TransportError::Other(format!(
                "unsupported method {other}"
            )))
        }
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => return TransportResponse::failed(map_error(&e)),
    };

    let status = response.status().as_u16();
    let mime_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(mime_essence);

    match response.body_mut().read_to_vec() {
        Ok(body) => TransportResponse {
            body: Some(body),
            status: Some(status),
            mime_type,
            error: None,
        },
        Err(e) => TransportResponse {
            body: None,
            status: Some(status),
            mime_type,
            error: Some(map_error(&e)),
        },
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &TransportRequest,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_error(err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(e) => match e.kind() {
            io::ErrorKind::TimedOut => TransportError::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => TransportError::Connection(e.to_string()),
            _ => TransportError::Io(e.to_string()),
        },
        other => TransportError::Other(other.to_string()),
    }
}

/// `"Application/JSON; charset=utf-8"` becomes `"application/json"`.
pub(crate) fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
