use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use blogline_api::config::{JwtConfig, ServerConfig};
use blogline_api::server::Server;
use blogline_auth::JwtClaims;
use blogline_infra::InMemoryStore;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = ServerConfig {
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
                ..JwtConfig::default()
            },
            ..ServerConfig::default()
        };
        config.validate().expect("test config must be valid");

        // Same router as prod, in-memory store, ephemeral port.
        let server = Server::with_store(config, Arc::new(InMemoryStore::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            server
                .serve(listener, std::future::pending())
                .await
                .unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: &str, ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims::new(sub, now, now + ttl);

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn signup(client: &reqwest::Client, srv: &TestServer, username: &str) -> String {
    let res = client
        .post(srv.url("/v1/users"))
        .json(&json!({
            "username": username,
            "password": "blogline-pass",
            "nickname": username,
            "email": format!("{username}@example.com"),
            "phone": "18110000000",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["userID"].as_str().unwrap().to_string()
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str) -> String {
    let res = client
        .post(srv.url("/login"))
        .json(&json!({"username": username, "password": "blogline-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["expireAt"].is_string());
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn healthz_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/healthz")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["cache-control"], "no-cache, no-store, max-age=0, must-revalidate");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/healthz"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    let first = client.get(srv.url("/healthz")).send().await.unwrap();
    let second = client.get(srv.url("/healthz")).send().await.unwrap();
    let a = first.headers()["x-request-id"].to_str().unwrap().to_string();
    let b = second.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens_without_side_effects() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let expected = json!({
        "code": 401,
        "reason": "Unauthenticated.TokenInvalid",
        "message": "Token was invalid.",
    });

    let res = client
        .post(srv.url("/v1/posts"))
        .header("x-request-id", "no-token")
        .json(&json!({"title": "t", "content": "c"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["x-request-id"], "no-token");
    assert_eq!(res.json::<Value>().await.unwrap(), expected);

    let wrong_secret = mint_jwt("another-secret", "user-x", ChronoDuration::minutes(10));
    let expired = mint_jwt(JWT_SECRET, "user-x", ChronoDuration::minutes(-10));
    for token in [wrong_secret, expired, "not-a-jwt".to_string()] {
        let res = client
            .post(srv.url("/v1/posts"))
            .bearer_auth(&token)
            .json(&json!({"title": "t", "content": "c"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.json::<Value>().await.unwrap(), expected);
    }

    // nothing was created by the rejected calls
    let token = mint_jwt(JWT_SECRET, "user-x", ChronoDuration::minutes(10));
    let res = client
        .get(srv.url("/v1/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["totalCount"], 0);
}

#[tokio::test]
async fn unknown_routes_are_not_found_envelope() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/nope")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "NotFound");
    assert_eq!(body["message"], "Page not found");
}

#[tokio::test]
async fn wrong_method_gets_not_found_envelope() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .patch(srv.url("/v1/users"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"code": 404, "reason": "NotFound", "message": "Page not found"})
    );
}

#[tokio::test]
async fn malformed_body_is_bind_error() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(srv.url("/v1/users"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "BindError");
}

#[tokio::test]
async fn invalid_signup_is_invalid_argument() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(srv.url("/v1/users"))
        .json(&json!({
            "username": "alice",
            "password": "short",
            "email": "alice@example.com",
            "phone": "18110000000",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "InvalidArgument");
}

#[tokio::test]
async fn oversized_phone_is_invalid_argument() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .post(srv.url("/v1/users"))
        .json(&json!({
            "username": "alice",
            "password": "blogline-pass",
            "email": "alice@example.com",
            "phone": "181100000000000000",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "InvalidArgument");
    assert_eq!(body["message"], "phone must be at most 16 characters");
}

#[tokio::test]
async fn user_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let alice = signup(&client, &srv, "alice").await;
    assert!(alice.starts_with("user-"));
    let token = login(&client, &srv, "alice").await;

    let dup = client
        .post(srv.url("/v1/users"))
        .json(&json!({
            "username": "alice",
            "password": "blogline-pass",
            "email": "a@example.com",
            "phone": "1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), StatusCode::BAD_REQUEST);
    assert_eq!(dup.json::<Value>().await.unwrap()["reason"], "AlreadyExist.UserAlreadyExists");

    let res = client
        .put(srv.url(&format!("/v1/users/{alice}")))
        .bearer_auth(&token)
        .json(&json!({"nickname": "Al"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/v1/users/{alice}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["userID"], alice.as_str());
    assert_eq!(body["user"]["nickname"], "Al");
    assert_eq!(body["user"]["postCount"], 0);

    let res = client
        .put(srv.url(&format!("/v1/users/{alice}/change-password")))
        .bearer_auth(&token)
        .json(&json!({"oldPassword": "blogline-pass", "newPassword": "even-better-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url("/login"))
        .json(&json!({"username": "alice", "password": "blogline-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await.unwrap()["reason"], "Unauthenticated.PasswordInvalid");

    let res = client
        .post(srv.url("/refresh-token"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let refreshed = res.json::<Value>().await.unwrap()["token"].as_str().unwrap().to_string();

    let res = client
        .delete(srv.url(&format!("/v1/users/{alice}")))
        .bearer_auth(&refreshed)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/v1/users/{alice}")))
        .bearer_auth(&refreshed)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await.unwrap()["reason"], "NotFound.UserNotFound");
}

#[tokio::test]
async fn users_cannot_delete_each_other() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let alice = signup(&client, &srv, "alice").await;
    signup(&client, &srv, "bob").await;
    let bob_token = login(&client, &srv, "bob").await;

    let res = client
        .delete(srv.url(&format!("/v1/users/{alice}")))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await.unwrap()["reason"], "PermissionDenied");

    let res = client
        .get(srv.url("/v1/users?limit=10"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["totalCount"], 2);
}

#[tokio::test]
async fn post_lifecycle_is_scoped_to_owner() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    signup(&client, &srv, "alice").await;
    let token = login(&client, &srv, "alice").await;

    let mut ids = Vec::new();
    for title in ["Rust tips", "Cooking", "More rust"] {
        let res = client
            .post(srv.url("/v1/posts"))
            .bearer_auth(&token)
            .json(&json!({"title": title, "content": "body"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        ids.push(body["postID"].as_str().unwrap().to_string());
    }
    assert!(ids.iter().all(|id| id.starts_with("post-")));

    let res = client
        .get(srv.url("/v1/posts?title=rust"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["totalCount"], 2);

    let res = client
        .put(srv.url(&format!("/v1/posts/{}", ids[1])))
        .bearer_auth(&token)
        .json(&json!({"title": "Baking"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/v1/posts/{}", ids[1])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["post"]["title"], "Baking");

    // another user sees none of it
    let stranger = mint_jwt(JWT_SECRET, "user-stranger", ChronoDuration::minutes(10));
    let res = client
        .get(srv.url(&format!("/v1/posts/{}", ids[0])))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await.unwrap()["reason"], "NotFound.PostNotFound");

    let res = client
        .delete(srv.url("/v1/posts"))
        .bearer_auth(&token)
        .json(&json!({"postIDs": [ids[0], ids[2]]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/v1/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["posts"][0]["postID"], ids[1].as_str());
}

#[tokio::test]
async fn list_limit_above_maximum_is_rejected() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(JWT_SECRET, "user-x", ChronoDuration::minutes(10));

    let res = reqwest::Client::new()
        .get(srv.url("/v1/posts?limit=101"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await.unwrap()["reason"], "InvalidArgument");
}

#[tokio::test]
async fn preflight_is_answered_by_cors() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, srv.url("/v1/posts"))
        .header("origin", "https://blog.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization, content-type, x-request-id")
        .header("x-request-id", "preflight-1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["x-request-id"], "preflight-1");
}
