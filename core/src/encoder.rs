//! Turns a `RequestDescriptor` into a `TransportRequest`.
//!
//! Encoding is pure: no I/O, no suspension, and the same descriptor always
//! yields the same request.

use crate::error::ClassifiedError;
use crate::http::{HttpMethod, TransportRequest};
use crate::request::RequestDescriptor;

pub fn encode(descriptor: &RequestDescriptor) -> Result<TransportRequest, ClassifiedError> {
    let method = descriptor.method();
    let mut url = descriptor.url().clone();

    if let HttpMethod::Get(items) = method {
        if url.cannot_be_a_base() {
            return Err(ClassifiedError::SetupInvalidUrl);
        }
        url.set_query(None);
        if !items.is_empty() {
            url.query_pairs_mut().extend_pairs(items);
        }
    }

    Ok(TransportRequest {
        url,
        method: method.name(),
        headers: descriptor.headers().clone(),
        body: method.body(),
        timeout: descriptor.timeout(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn encode_str(url: &str, method: HttpMethod) -> TransportRequest {
        encode(&RequestDescriptor::parse(url, method).unwrap()).unwrap()
    }

    #[test]
    fn get_appends_query_items() {
        let req = encode_str("https://h/path1", HttpMethod::get([("q", "x")]));
        assert_eq!(req.url.as_str(), "https://h/path1?q=x");
        assert_eq!(req.method, "GET");
        assert!(req.body.is_none());
    }

    #[test]
    fn get_replaces_existing_query() {
        let req = encode_str(
            "https://h/path1?old=1",
            HttpMethod::get([("b", "2"), ("a", "1")]),
        );
        assert_eq!(req.url.as_str(), "https://h/path1?b=2&a=1");
    }

    #[test]
    fn get_without_items_has_no_query() {
        let no_items = Vec::<(String, String)>::new();
        let req = encode_str("https://h/path1?old=1", HttpMethod::get(no_items));
        assert_eq!(req.url.as_str(), "https://h/path1");
    }

    #[test]
    fn get_query_items_roundtrip_in_order() {
        let items = [("first", "a b"), ("second", "&="), ("first", "again")];
        let req = encode_str("https://h/search", HttpMethod::get(items));
        let parsed: Vec<(String, String)> = req.url.query_pairs().into_owned().collect();
        let expected: Vec<(String, String)> = items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn get_on_opaque_url_fails() {
        let descriptor =
            RequestDescriptor::parse("mailto:someone@example.com", HttpMethod::get([("q", "x")]))
                .unwrap();
        assert!(matches!(
            encode(&descriptor),
            Err(ClassifiedError::SetupInvalidUrl)
        ));
    }

    #[test]
    fn post_body_is_payload_json() {
        let payload = serde_json::json!({"title": "Buy milk", "done": false});
        let req = encode_str("https://h/items", HttpMethod::post(&payload));
        assert_eq!(req.method, "POST");
        assert_eq!(req.url.as_str(), "https://h/items");
        let body: serde_json::Value = serde_json::from_slice(&req.body.unwrap()).unwrap();
        assert_eq!(body, payload);
    }

    #[test]
    fn put_without_payload_has_no_body() {
        let req = encode_str("https://h/items?keep=1", HttpMethod::Put(None));
        assert_eq!(req.method, "PUT");
        assert_eq!(req.url.as_str(), "https://h/items?keep=1");
        assert!(req.body.is_none());

        let req = encode_str("https://h/items", HttpMethod::put(&Option::<u32>::None));
        assert!(req.body.is_none());
    }

    #[test]
    fn headers_and_timeout_are_copied() {
        let descriptor = RequestDescriptor::parse("https://h/items/1", HttpMethod::Head)
            .unwrap()
            .with_header("authorization", "Bearer t")
            .with_timeout(Duration::from_secs(2));
        let req = encode(&descriptor).unwrap();
        assert_eq!(req.method, "HEAD");
        assert_eq!(req.headers, *descriptor.headers());
        assert_eq!(req.timeout, Duration::from_secs(2));

        let req = encode_str("https://h/items/1", HttpMethod::Delete);
        assert_eq!(req.timeout, crate::request::DEFAULT_TIMEOUT);
    }
}
