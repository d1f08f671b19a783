//! Notifications API tests against a mock HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use stackit_client::{Error, ListNotificationsQuery, StackitClient, TokenProvider};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> StackitClient {
    StackitClient::builder()
        .base_url(server.uri())
        .auth_token("secret")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_list_notifications() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 2,
                "user_id": 1,
                "message": "bob commented on your post",
                "type": "comment",
                "reference_id": 9,
                "is_read": false,
                "created_at": "2024-05-02T08:00:00"
            },
            {
                "id": 1,
                "user_id": 1,
                "message": "alice answered your question",
                "type": "answer",
                "reference_id": 4,
                "is_read": true,
                "created_at": "2024-05-01T08:00:00"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let notifications = client_for(&server).notifications().list().await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].id, 2);
    assert!(!notifications[0].is_read);
    assert!(notifications[1].is_read);
}

#[tokio::test]
async fn test_list_with_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("skip", "10"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let query = ListNotificationsQuery {
        skip: Some(10),
        limit: Some(5),
    };
    let notifications = client_for(&server)
        .notifications()
        .list_with_query(&query)
        .await
        .unwrap();
    assert!(notifications.is_empty());
}

#[tokio::test]
async fn test_mark_all_read() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notifications/read_all"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let status = client_for(&server).notifications().mark_all_read().await.unwrap();
    assert_eq!(status.status, "success");
}

#[tokio::test]
async fn test_server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server).notifications().list().await.unwrap_err();
    assert!(err.is_server_error());
    assert!(matches!(err, Error::Api { status: 500, .. }));
}

#[derive(Default)]
struct CountingTokens {
    rejected: AtomicUsize,
}

impl TokenProvider for CountingTokens {
    fn token(&self) -> Option<String> {
        Some("expired".to_string())
    }

    fn on_unauthorized(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_unauthorized_notifies_token_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})),
        )
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokens::default());
    let client = StackitClient::builder()
        .base_url(server.uri())
        .token_provider(tokens.clone())
        .build()
        .unwrap();

    let err = client.notifications().list().await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(err.to_string().contains("Could not validate credentials"));
    assert_eq!(tokens.rejected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_token_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})))
        .mount(&server)
        .await;

    let client = StackitClient::builder().base_url(server.uri()).build().unwrap();
    let err = client.notifications().list().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}
