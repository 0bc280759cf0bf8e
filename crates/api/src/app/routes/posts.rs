use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    response::Response,
    Json,
};

use blogline_infra::{Page, PostQuery};

use crate::app::response::ResponseWriter;
use crate::app::routes::common::bind_error;
use crate::app::services::AppServices;
use crate::app::{dto, validation};
use crate::context::RequestContext;

pub async fn create_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    body: Result<Json<dto::CreatePostRequest>, JsonRejection>,
) -> Response {
    tracing::info!("create post function called");
    writer.write(create_post_inner(&services, &ctx, body).await)
}

async fn create_post_inner(
    services: &AppServices,
    ctx: &RequestContext,
    body: Result<Json<dto::CreatePostRequest>, JsonRejection>,
) -> anyhow::Result<dto::CreatePostResponse> {
    let Json(req) = body.map_err(bind_error)?;
    validation::create_post(&req)?;
    services.posts().create(ctx, req).await
}

pub async fn update_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    Path(post_id): Path<String>,
    body: Result<Json<dto::UpdatePostRequest>, JsonRejection>,
) -> Response {
    tracing::info!("update post function called");
    writer.write(update_post_inner(&services, &ctx, &post_id, body).await)
}

async fn update_post_inner(
    services: &AppServices,
    ctx: &RequestContext,
    post_id: &str,
    body: Result<Json<dto::UpdatePostRequest>, JsonRejection>,
) -> anyhow::Result<dto::Empty> {
    let Json(req) = body.map_err(bind_error)?;
    validation::update_post(&req)?;
    services.posts().update(ctx, post_id, req).await
}

pub async fn delete_posts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    body: Result<Json<dto::DeletePostRequest>, JsonRejection>,
) -> Response {
    tracing::info!("delete posts function called");
    writer.write(delete_posts_inner(&services, &ctx, body).await)
}

async fn delete_posts_inner(
    services: &AppServices,
    ctx: &RequestContext,
    body: Result<Json<dto::DeletePostRequest>, JsonRejection>,
) -> anyhow::Result<dto::Empty> {
    let Json(req) = body.map_err(bind_error)?;
    validation::delete_posts(&req)?;
    services.posts().delete(ctx, req).await
}

pub async fn get_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    Path(post_id): Path<String>,
) -> Response {
    tracing::info!("get post function called");
    writer.write(services.posts().get(&ctx, &post_id).await)
}

pub async fn list_posts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(writer): Extension<ResponseWriter>,
    ctx: RequestContext,
    query: Result<Query<dto::ListPostRequest>, QueryRejection>,
) -> Response {
    tracing::info!("list posts function called");
    writer.write(list_posts_inner(&services, &ctx, query).await)
}

async fn list_posts_inner(
    services: &AppServices,
    ctx: &RequestContext,
    query: Result<Query<dto::ListPostRequest>, QueryRejection>,
) -> anyhow::Result<dto::ListPostResponse> {
    let Query(req) = query.map_err(bind_error)?;
    let (offset, limit) = validation::page(req.offset, req.limit)?;
    let query = PostQuery {
        page: Page { offset, limit },
        title: req.title.filter(|t| !t.is_empty()),
    };
    services.posts().list(ctx, query).await
}
