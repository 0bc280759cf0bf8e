use axum::{extract::Extension, response::Response};
use chrono::Utc;

use blogline_core::errorx::ERR_NOT_FOUND;

use crate::app::dto;
use crate::app::response::ResponseWriter;

pub async fn healthz(Extension(writer): Extension<ResponseWriter>) -> Response {
    writer.write(Ok(dto::HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    }))
}

/// Fallback for unmatched routes.
pub async fn not_found(Extension(writer): Extension<ResponseWriter>) -> Response {
    writer.error(ERR_NOT_FOUND.with_message("Page not found"))
}
