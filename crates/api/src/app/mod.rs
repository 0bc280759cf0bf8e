//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: business layer over the store
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `response.rs`: the success/error envelope
//! - `validation.rs`: structural request checks

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use blogline_auth::JwtValidator;

use crate::middleware::{self, AuthState};

pub mod dto;
pub mod response;
pub mod routes;
pub mod services;
pub mod validation;

use response::ResponseWriter;
use services::AppServices;

/// Everything the router needs, built once at startup and read-only after.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<AppServices>,
    pub jwt: Arc<dyn JwtValidator>,
    pub writer: ResponseWriter,
    pub cors_origins: Vec<String>,
}

/// Build the full HTTP router with the global interceptor chain applied.
pub fn build_app(state: AppState) -> Router {
    let auth_state = AuthState {
        jwt: state.jwt,
        writer: state.writer,
    };

    routes::router(auth_state)
        .layer(Extension(state.services))
        .layer(Extension(state.writer))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::recovery))
                .layer(axum::middleware::from_fn(middleware::no_cache))
                .layer(middleware::build_cors_layer(&state.cors_origins))
                .layer(axum::middleware::from_fn(middleware::request_id)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use blogline_auth::{Hs256Jwt, TokenIssuer};
    use blogline_infra::InMemoryStore;
    use tower::ServiceExt;

    fn app_with_jwt() -> (Router, Arc<Hs256Jwt>) {
        let jwt = Arc::new(Hs256Jwt::new(b"secret", chrono::Duration::hours(1)));
        let app = build_app(AppState {
            services: Arc::new(AppServices::new(Arc::new(InMemoryStore::new()), jwt.clone())),
            jwt: jwt.clone(),
            writer: ResponseWriter::default(),
            cors_origins: vec!["*".to_string()],
        });
        (app, jwt)
    }

    fn app() -> Router {
        app_with_jwt().0
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_refresh_is_traced_and_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/refresh-token")
                    .header(middleware::X_REQUEST_ID, "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[middleware::X_REQUEST_ID], "trace-me");
        assert!(response.headers().contains_key(axum::http::header::CACHE_CONTROL));
    }

    #[tokio::test]
    async fn signup_is_public() {
        let body = serde_json::json!({
            "username": "alice",
            "password": "blogline-pass",
            "email": "alice@example.com",
            "phone": "18110000000",
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/users")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_users_requires_auth() {
        let response = app()
            .oneshot(Request::builder().uri("/v1/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_user_list_is_served() {
        let (app, jwt) = app_with_jwt();
        let token = jwt.issue("user-1", chrono::Utc::now()).unwrap().token;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/users?limit=5")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalCount"], 0);
        assert!(body["users"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_not_found_envelope() {
        for (method, uri) in [("PATCH", "/v1/users"), ("DELETE", "/healthz"), ("POST", "/v1/posts/post-x")] {
            let response = app()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .header(middleware::X_REQUEST_ID, "wrong-method")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(response.headers()[middleware::X_REQUEST_ID], "wrong-method");
            assert_eq!(
                body_json(response).await,
                serde_json::json!({
                    "code": 404,
                    "reason": "NotFound",
                    "message": "Page not found",
                })
            );
        }
    }
}
