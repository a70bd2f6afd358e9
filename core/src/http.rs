//! HTTP method and transport types.
//!
//! # Design
//! `TransportRequest` and `TransportResponse` describe one round-trip as plain
//! data. The encoder produces the former and a `Transport` produces the
//! latter, so every step between them can be exercised without a network.
//!
//! Every field of `TransportResponse` is optional. A transport reports what
//! it observed and the executor decides what counts as a fault.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use url::Url;

/// HTTP method of a request, carrying the data that method needs.
///
/// Two methods compare equal when their wire names match; query items and
/// payloads are ignored.
#[derive(Debug, Clone)]
pub enum HttpMethod {
    Get(Vec<(String, String)>),
    Put(Option<Value>),
    Post(Option<Value>),
    Delete,
    Head,
}

impl HttpMethod {
    /// `GET` with ordered query items.
    pub fn get<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        HttpMethod::Get(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `PUT` with a JSON payload. A payload that serializes to `null`, or
    /// that serde cannot represent as JSON, goes out without a body.
    pub fn put<P: Serialize>(payload: &P) -> Self {
        HttpMethod::Put(json_payload(payload))
    }

    /// `POST` with a JSON payload, under the same rules as [`HttpMethod::put`].
    pub fn post<P: Serialize>(payload: &P) -> Self {
        HttpMethod::Post(json_payload(payload))
    }

    pub fn name(&self) -> &'static str {
        match self {
            HttpMethod::Get(_) => "GET",
            HttpMethod::Put(_) => "PUT",
            HttpMethod::Post(_) => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }

    /// JSON body for `PUT`/`POST`, `None` for everything else.
    pub fn body(&self) -> Option<Vec<u8>> {
        match self {
            HttpMethod::Put(payload) | HttpMethod::Post(payload) => {
                payload.as_ref().and_then(|v| serde_json::to_vec(v).ok())
            }
            HttpMethod::Get(_) | HttpMethod::Delete | HttpMethod::Head => None,
        }
    }
}

fn json_payload<P: Serialize>(payload: &P) -> Option<Value> {
    serde_json::to_value(payload).ok().filter(|v| !v.is_null())
}

impl PartialEq for HttpMethod {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for HttpMethod {}

/// A fully encoded request, ready for a `Transport`.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub method: &'static str,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// What a `Transport` observed for one request.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub body: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub mime_type: Option<String>,
    pub error: Option<crate::error::TransportError>,
}

impl TransportResponse {
    /// A response with a status, a MIME type and a body.
    pub fn new(status: u16, mime_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            status: Some(status),
            mime_type: Some(mime_type.to_string()),
            error: None,
        }
    }

    /// A response that never made it off the wire.
    pub fn failed(error: crate::error::TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}
