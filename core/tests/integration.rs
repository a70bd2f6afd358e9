//! End-to-end requests over real HTTP.
//!
//! # Design
//! Starts the mock server on a random port, then drives `RequestManager`
//! with the default `UreqTransport` against it. Validates that encoding,
//! classification and decoding hold up against an actual HTTP stack.

use std::time::Duration;

use mock_server::Item;
use netq_core::{
    ClassifiedError, HttpMethod, ManagerConfig, MimePolicy, RequestDescriptor, RequestManager,
    TransportError, UreqTransport,
};
use serde::Serialize;
use serde_json::Value;

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}")
}

fn manager(mime_policy: MimePolicy) -> RequestManager {
    RequestManager::new(
        ManagerConfig::default().with_mime_policy(mime_policy),
        UreqTransport::new(),
    )
    .unwrap()
}

async fn fetch<T>(
    manager: &RequestManager,
    descriptor: RequestDescriptor,
) -> Result<T, ClassifiedError>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let (handle, rx) = manager.submit_oneshot::<T>(descriptor);
    assert!(handle.is_some(), "descriptor was rejected");
    tokio::time::timeout(Duration::from_secs(10), rx)
        .await
        .expect("request timed out")
        .expect("completion dropped")
}

#[derive(Serialize)]
struct NewItem<'a> {
    name: &'a str,
    quantity: u32,
}

#[tokio::test(flavor = "multi_thread")]
async fn create_then_list_items() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let created: Item = fetch(
        &manager,
        RequestDescriptor::parse(
            &format!("{base}/items"),
            HttpMethod::post(&NewItem {
                name: "washer",
                quantity: 12,
            }),
        )
        .unwrap()
        .with_header("content-type", "application/json"),
    )
    .await
    .unwrap();
    assert_eq!(created.name, "washer");
    assert_eq!(created.quantity, 12);

    let no_items = Vec::<(String, String)>::new();
    let list = RequestDescriptor::parse(&format!("{base}/items"), HttpMethod::get(no_items));
    let items: Vec<Item> = fetch(&manager, list.unwrap()).await.unwrap();
    assert_eq!(items, vec![created]);
}

#[tokio::test(flavor = "multi_thread")]
async fn query_items_arrive_encoded_and_in_order() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let echoed: Value = fetch(
        &manager,
        RequestDescriptor::parse(
            &format!("{base}/echo/query"),
            HttpMethod::get([("z", "last first"), ("a", "1&2")]),
        )
        .unwrap(),
    )
    .await
    .unwrap();

    let query = echoed["query"].as_str().unwrap();
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("z".to_string(), "last first".to_string()),
            ("a".to_string(), "1&2".to_string())
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn put_body_is_payload_json() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let payload = serde_json::json!({"tags": ["a", "b"], "n": 3});
    let echoed: Value = fetch(
        &manager,
        RequestDescriptor::parse(&format!("{base}/echo/body"), HttpMethod::put(&payload)).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(echoed["method"], "PUT");
    assert_eq!(echoed["body"], payload);
}

#[tokio::test(flavor = "multi_thread")]
async fn not_found_status_is_classified() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let err = fetch::<Value>(
        &manager,
        RequestDescriptor::parse(&format!("{base}/status/404"), HttpMethod::get([("q", "x")]))
            .unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClassifiedError::BadStatusCode(404)));
}

#[tokio::test(flavor = "multi_thread")]
async fn default_policy_rejects_expected_mime() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RejectMatching);

    let err = fetch::<Vec<Item>>(
        &manager,
        RequestDescriptor::parse(&format!("{base}/items"), HttpMethod::get([("q", "x")])).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClassifiedError::BadMimeType { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_text_fails_require_match() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let err = fetch::<Value>(
        &manager,
        RequestDescriptor::parse(&format!("{base}/plain"), HttpMethod::get([("q", "x")])).unwrap(),
    )
    .await
    .unwrap_err();
    match err {
        ClassifiedError::BadMimeType { got, expected } => {
            assert_eq!(got, "text/plain");
            assert_eq!(expected, "application/json");
        }
        other => panic!("expected BadMimeType, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn expected_mime_override_accepts_plain_text() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let err = fetch::<Value>(
        &manager,
        RequestDescriptor::parse(&format!("{base}/plain"), HttpMethod::get([("q", "x")]))
            .unwrap()
            .with_expected_mime_type("text/plain"),
    )
    .await
    .unwrap_err();
    // The MIME check passes; "plain text" is still not JSON.
    assert!(matches!(err, ClassifiedError::DecodeFailure(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_response_times_out() {
    let base = start_server().await;
    let manager = manager(MimePolicy::RequireMatch);

    let err = fetch::<Value>(
        &manager,
        RequestDescriptor::parse(&format!("{base}/delay/2000"), HttpMethod::get([("q", "x")]))
            .unwrap()
            .with_timeout(Duration::from_millis(200)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClassifiedError::Transport(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let manager = manager(MimePolicy::RequireMatch);

    let err = fetch::<Value>(
        &manager,
        RequestDescriptor::parse(&format!("http://{addr}/items"), HttpMethod::Delete).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, ClassifiedError::Transport(ref e) if *e != TransportError::Timeout),
        "unexpected error: {err:?}"
    );
}
