#![allow(clippy::unwrap_used)]
// Integration tests for `ResourceClient` using wiremock.

use serde::Deserialize;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use machdesk_api::{Error, ResourceClient};

#[derive(Debug, Deserialize)]
struct Row {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ResourceClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ResourceClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Listing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_page_sends_pagination_and_keeps_order() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/machines"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [
                { "id": 2, "name": "Lathe" },
                { "id": 1, "name": "Mill" }
            ],
            "total": 2,
            "page": 1,
            "pages": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .list_page::<Row>("machines", "machines", 1, 50, None)
        .await
        .unwrap();

    let ids: Vec<u64> = page.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(page.items[0].name.as_deref(), Some("Lathe"));
    assert_eq!(page.total, Some(2));
    assert_eq!(page.pages, Some(1));
}

#[tokio::test]
async fn test_list_page_attaches_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/machines"))
        .and(header("authorization", "Bearer access-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "machines": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let token: secrecy::SecretString = "access-123".to_string().into();
    let page = client
        .list_page::<Row>("machines", "machines", 1, 10, Some(&token))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert!(page.total.is_none());
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_success_status_is_endpoint_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .mount(&server)
        .await;

    let result = client
        .list_page::<Row>("machines", "machines", 1, 50, None)
        .await;

    match result {
        Err(Error::Endpoint { status, ref message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "db down");
        }
        other => panic!("expected Endpoint error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_collection_field() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let result = client
        .list_page::<Row>("machines", "machines", 1, 50, None)
        .await;

    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    drop(server);

    let client = ResourceClient::with_client(reqwest::Client::new(), base_url);
    let result = client
        .list_page::<Row>("machines", "machines", 1, 50, None)
        .await;

    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}
