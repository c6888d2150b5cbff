//! End-to-end tests for the REST API over a real socket

use std::net::SocketAddr;
use std::sync::Arc;

use kv_rs::api::ApiServer;
use kv_rs::config::Config;
use kv_rs::store::SqliteStore;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    client: Client,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestServer {
    /// Helper function to start a server on an ephemeral port
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database_url = format!("sqlite://{}", dir.path().join("kv.db").display());
        config.auth.jwt_secret = "api-test-secret".to_string();
        config.limits.default_provisioned_capacity = 1000;

        let store = SqliteStore::connect(&config.storage, config.limits)
            .await
            .unwrap();
        let server = ApiServer::new(Arc::new(store), &config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            client: Client::new(),
            shutdown: Some(tx),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/api{}", self.addr, path)
    }

    async fn register(&self, name: &str, password: &str, capacity: Option<i64>) -> StatusCode {
        let mut body = json!({"user_name": name, "password": password});
        if let Some(capacity) = capacity {
            body["provisioned_capacity"] = json!(capacity);
        }
        self.client
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn login(&self, name: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({"user_name": name, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn quota(&self, token: &str) -> Value {
        self.client
            .get(self.url("/quota"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_and_login() {
    let server = TestServer::start().await;

    assert_eq!(server.register("alice", "pw", None).await, StatusCode::CREATED);
    assert_eq!(server.register("alice", "pw", None).await, StatusCode::CONFLICT);

    let token = server.login("alice", "pw").await;
    assert!(!token.is_empty());

    let quota = server.quota(&token).await;
    assert_eq!(quota["provisioned"], 1000);
    assert_eq!(quota["utilised"], 0);

    let response = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({"user_name": "alice", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid username/password");
}

#[tokio::test]
async fn test_object_lifecycle() {
    let server = TestServer::start().await;
    server.register("bob", "pw", Some(500)).await;
    let token = server.login("bob", "pw").await;

    let response = server
        .client
        .post(server.url("/object"))
        .bearer_auth(&token)
        .json(&json!({"key": "profile", "value": {"age": 30}, "ttl": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server
        .client
        .get(server.url("/object/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"key": "profile", "value": {"age": 30}, "ttl": 0}));

    assert_eq!(server.quota(&token).await["utilised"], 10);

    // Raw token without the Bearer scheme is accepted too
    let response = server
        .client
        .delete(server.url("/object/profile"))
        .header("Authorization", token.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .client
        .get(server.url("/object/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.quota(&token).await["utilised"], 0);
}

#[tokio::test]
async fn test_quota_enforced_over_http() {
    let server = TestServer::start().await;
    server.register("carol", "pw", Some(50)).await;
    let token = server.login("carol", "pw").await;

    let response = server
        .client
        .post(server.url("/object"))
        .bearer_auth(&token)
        .json(&json!({"key": "big", "value": "x".repeat(100)}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "quota_exceeded");

    let response = server
        .client
        .post(server.url("/batch/object"))
        .bearer_auth(&token)
        .json(&json!([
            {"key": "a", "value": "x".repeat(20)},
            {"key": "b", "value": "x".repeat(20)},
            {"key": "c", "value": "x".repeat(20)}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.quota(&token).await["utilised"], 0);
}

#[tokio::test]
async fn test_batch_over_http() {
    let server = TestServer::start().await;
    server.register("dave", "pw", None).await;
    let token = server.login("dave", "pw").await;

    let response = server
        .client
        .post(server.url("/batch/object"))
        .bearer_auth(&token)
        .json(&json!([
            {"key": "a", "value": 1},
            {"key": "b", "value": [true]}
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let quota = server.quota(&token).await;
    assert_eq!(quota["utilised"], 7);
    assert_eq!(quota["remaining"], 993);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let server = TestServer::start().await;
    server.register("erin", "pw", None).await;
    server.register("frank", "pw", None).await;
    let erin = server.login("erin", "pw").await;
    let frank = server.login("frank", "pw").await;

    server
        .client
        .post(server.url("/object"))
        .bearer_auth(&erin)
        .json(&json!({"key": "secret", "value": "erin-only"}))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/object/secret"))
        .bearer_auth(&frank)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_requests() {
    let server = TestServer::start().await;
    server.register("gina", "pw", None).await;
    let token = server.login("gina", "pw").await;

    let response = server
        .client
        .post(server.url("/object"))
        .bearer_auth(&token)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server
        .client
        .post(server.url("/object"))
        .bearer_auth(&token)
        .json(&json!({"key": "k", "value": 1, "ttl": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_input");

    let response = server
        .client
        .get(server.url("/quota"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
