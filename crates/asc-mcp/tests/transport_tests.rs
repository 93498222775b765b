//! Transport tests against a mock App Store Connect API.
//!
//! Covers bearer authentication, pagination over `links.next`, error
//! mapping and empty bodies.

mod common;

use asc_mcp::clients::{RequestPayload, Resource, TransportError};
use common::{client, resource};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(id: &str) -> serde_json::Value {
    resource("apps", id, serde_json::json!({"name": format!("App {}", id)}))
}

#[tokio::test]
async fn test_get_sends_bearer_token_and_unwraps_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps/42"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": app("42") })))
        .expect(1)
        .mount(&server)
        .await;

    let app: Resource = client(&server.uri())
        .get("/v1/apps/42", RequestPayload::None)
        .await
        .unwrap();

    assert_eq!(app.id, "42");
    assert_eq!(app.kind, "apps");
    assert_eq!(app.attr_str("name"), Some("App 42"));
}

#[tokio::test]
async fn test_list_follows_next_links() {
    let server = MockServer::start().await;
    let next = format!("{}/v1/apps?cursor=page2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [app("1"), app("2")],
            "links": {"self": format!("{}/v1/apps", server.uri()), "next": next}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [app("3")],
            "links": {"self": format!("{}/v1/apps?cursor=page2", server.uri())}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let apps: Vec<Resource> = client(&server.uri())
        .list("/v1/apps", RequestPayload::None, 10)
        .await
        .unwrap();

    let ids: Vec<_> = apps.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_list_truncates_to_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [app("1"), app("2")],
            "links": {"next": format!("{}/v1/apps?cursor=more", server.uri())}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .and(query_param("cursor", "more"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [app("3"), app("4")],
            "links": {"next": format!("{}/v1/apps?cursor=even-more", server.uri())}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let apps: Vec<Resource> = client(&server.uri())
        .list("/v1/apps", RequestPayload::None, 3)
        .await
        .unwrap();

    assert_eq!(apps.len(), 3);
    assert_eq!(apps[2].id, "3");
}

#[tokio::test]
async fn test_list_caps_page_size_and_keeps_filters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/builds"))
        .and(query_param("limit", "200"))
        .and(query_param("filter[app]", "99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let builds: Vec<Resource> = client(&server.uri())
        .list(
            "/v1/builds",
            RequestPayload::query([("filter[app]", "99"), ("limit", "5")]),
            1000,
        )
        .await
        .unwrap();

    assert!(builds.is_empty());
}

#[tokio::test]
async fn test_list_stops_on_empty_page_with_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [],
            "links": {"next": format!("{}/v1/apps?cursor=loop", server.uri())}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let apps: Vec<Resource> = client(&server.uri())
        .list("/v1/apps", RequestPayload::None, 50)
        .await
        .unwrap();

    assert!(apps.is_empty());
}

#[tokio::test]
async fn test_list_refuses_foreign_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [app("1")],
            "links": {"next": "https://collector.example.net/v1/apps?cursor=2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .list::<Resource>("/v1/apps", RequestPayload::None, 50)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::InvalidResponse(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_error_document_becomes_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "errors": [{
                "status": "404",
                "code": "NOT_FOUND",
                "title": "The specified resource does not exist",
                "detail": "There is no resource of type 'apps' with id 'missing'"
            }]
        })))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .get::<Resource>("/v1/apps/missing", RequestPayload::None)
        .await
        .unwrap_err();

    match err {
        TransportError::Rejected { status, detail } => {
            assert_eq!(status, 404);
            assert!(detail.contains("does not exist"), "detail: {}", detail);
            assert!(detail.contains("'missing'"), "detail: {}", detail);
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .list::<Resource>("/v1/apps", RequestPayload::None, 1)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/betaTesters/abc-123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server.uri())
        .delete("/v1/betaTesters/abc-123")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_patch_sends_body_and_unwraps_data() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "data": {
            "type": "betaGroups",
            "id": "g1",
            "attributes": {"publicLinkEnabled": true}
        }
    });

    Mock::given(method("PATCH"))
        .and(path("/v1/betaGroups/g1"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": resource("betaGroups", "g1", serde_json::json!({"publicLinkEnabled": true}))
        })))
        .expect(1)
        .mount(&server)
        .await;

    let group: Resource = client(&server.uri())
        .patch("/v1/betaGroups/g1", body)
        .await
        .unwrap();

    assert_eq!(group.id, "g1");
    assert_eq!(group.attributes["publicLinkEnabled"], true);
}

#[tokio::test]
async fn test_execute_returns_none_for_empty_body() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/betaGroups/g1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
        .mount(&server)
        .await;

    let body = client(&server.uri())
        .execute(
            reqwest::Method::PATCH,
            "/v1/betaGroups/g1",
            RequestPayload::Body(serde_json::json!({"data": {}})),
        )
        .await
        .unwrap();

    assert!(body.is_none());
}

#[tokio::test]
async fn test_malformed_json_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .list::<Resource>("/v1/apps", RequestPayload::None, 5)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::InvalidResponse(_)), "got {:?}", err);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unreachable_host() {
    // Nothing listens on the discard port.
    let err = client("http://127.0.0.1:9")
        .get::<Resource>("/v1/apps/1", RequestPayload::None)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Unreachable(_)), "got {:?}", err);
    assert!(err.is_transient());
}
