//! Request interceptors.
//!
//! Global order, outermost first:
//! 1. [`recovery`]: resolves the request ID and contains panics from
//!    everything below it
//! 2. [`no_cache`]: cache suppression headers on every response
//! 3. CORS ([`build_cors_layer`]): answers preflights itself
//! 4. [`request_id`]: binds and echoes `x-request-id`
//!
//! [`authn`] is attached per route, inside the global chain, so a rejected
//! credential is still traced under its request ID.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderName},
        HeaderMap, HeaderValue, Method,
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use futures::FutureExt;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

use blogline_auth::JwtValidator;
use blogline_core::errorx::{ERR_INTERNAL, ERR_TOKEN_INVALID};

use crate::app::response::ResponseWriter;
use crate::context::RequestContext;

pub const X_REQUEST_ID: &str = "x-request-id";

const NO_CACHE: &str = "no-cache, no-store, max-age=0, must-revalidate";
const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Converts a panic anywhere downstream into the `InternalError` envelope.
///
/// A missing request ID is generated here and written into the request
/// headers, so [`request_id`] binds the same value. Responses that never
/// reached [`request_id`] (panics, CORS preflights) get it echoed here.
pub async fn recovery(mut req: Request, next: Next) -> Response {
    let id = match inbound_request_id(req.headers()) {
        Some(id) => id.to_owned(),
        None => Uuid::new_v4().to_string(),
    };
    let header_value = HeaderValue::from_str(&id).ok();
    if let Some(value) = &header_value {
        req.headers_mut()
            .insert(HeaderName::from_static(X_REQUEST_ID), value.clone());
    }

    let mut response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                request_id = %id,
                panic = %panic_message(panic.as_ref()),
                "recovered from panic"
            );
            ResponseWriter::default().error(ERR_INTERNAL)
        }
    };

    if let Some(value) = header_value {
        response.headers_mut().entry(X_REQUEST_ID).or_insert(value);
    }
    response
}

fn inbound_request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

pub async fn no_cache(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::EXPIRES, HeaderValue::from_static(EPOCH));
    let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    if let Ok(value) = HeaderValue::from_str(&now) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    response
}

/// A `"*"` entry allows any origin; otherwise each entry is an exact origin.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
        ])
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = inbound_request_id(req.headers())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
        .with_request_id(id.clone());
    req.extensions_mut().insert(ctx);

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_REQUEST_ID), value);
    }
    response
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub writer: ResponseWriter,
}

/// Verifies the bearer token and binds its subject as the user ID.
pub async fn authn(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        tracing::debug!("missing or malformed authorization header");
        return state.writer.error(ERR_TOKEN_INVALID);
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "bearer token rejected");
            return state.writer.error(ERR_TOKEN_INVALID);
        }
    };

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
        .with_user_id(claims.sub);
    req.extensions_mut().insert(ctx);

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
