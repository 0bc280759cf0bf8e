use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    response::Response,
    Json,
};

use blogline_infra::Page;

use crate::app::response::ResponseWriter;
use crate::app::routes::common::bind_error;
use crate::app::services::AppServices;
use crate::app::{dto, validation};
use crate::context::RequestContext;

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Response {
    tracing::info!("create user function called");
    writer.write(create_user_inner(&services, body).await)
}

async fn create_user_inner(
    services: &AppServices,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> anyhow::Result<dto::CreateUserResponse> {
    let Json(req) = body.map_err(bind_error)?;
    validation::create_user(&req)?;
    services.users().create(req).await
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    Path(user_id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> Response {
    tracing::info!("update user function called");
    writer.write(update_user_inner(&services, &ctx, &user_id, body).await)
}

async fn update_user_inner(
    services: &AppServices,
    ctx: &RequestContext,
    user_id: &str,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> anyhow::Result<dto::Empty> {
    let Json(req) = body.map_err(bind_error)?;
    validation::update_user(&req)?;
    services.users().update(ctx, user_id, req).await
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    Path(user_id): Path<String>,
) -> Response {
    tracing::info!("delete user function called");
    writer.write(services.users().delete(&ctx, &user_id).await)
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    Path(user_id): Path<String>,
) -> Response {
    tracing::info!("get user function called");
    writer.write(services.users().get(&user_id).await)
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    query: Result<Query<dto::ListUserRequest>, QueryRejection>,
) -> Response {
    tracing::info!("list users function called");
    writer.write(list_users_inner(&services, query).await)
}

async fn list_users_inner(
    services: &AppServices,
    query: Result<Query<dto::ListUserRequest>, QueryRejection>,
) -> anyhow::Result<dto::ListUserResponse> {
    let Query(req) = query.map_err(bind_error)?;
    let (offset, limit) = validation::page(req.offset, req.limit)?;
    services.users().list(Page { offset, limit }).await
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    Path(user_id): Path<String>,
    body: Result<Json<dto::ChangePasswordRequest>, JsonRejection>,
) -> Response {
    tracing::info!("change password function called");
    writer.write(change_password_inner(&services, &ctx, &user_id, body).await)
}

async fn change_password_inner(
    services: &AppServices,
    ctx: &RequestContext,
    user_id: &str,
    body: Result<Json<dto::ChangePasswordRequest>, JsonRejection>,
) -> anyhow::Result<dto::Empty> {
    let Json(req) = body.map_err(bind_error)?;
    validation::change_password(&req)?;
    services.users().change_password(ctx, user_id, req).await
}
