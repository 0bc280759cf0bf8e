use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Response,
    Json,
};

use crate::app::dto;
use crate::app::response::ResponseWriter;
use crate::app::routes::common::bind_error;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Response {
    tracing::info!("login function called");
    writer.write(login_inner(&services, body).await)
}

async fn login_inner(
    services: &AppServices,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> anyhow::Result<dto::TokenResponse> {
    let Json(req) = body.map_err(bind_error)?;
    services.users().login(req).await
}

pub async fn refresh_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
) -> Response {
    tracing::info!("refresh token function called");
    writer.write(services.users().refresh_token(&ctx))
}
