//! Uniform response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use blogline_core::errorx::{ErrorX, ERR_INTERNAL};

/// Whether unclassified failures may show their raw text to callers.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub expose_internal_errors: bool,
}

impl ErrorPolicy {
    /// Rewrite the message of an unclassified failure unless exposure is on.
    /// Classified errors (including `InternalError.*` sub-reasons) pass through.
    pub fn apply(&self, err: ErrorX) -> ErrorX {
        if !self.expose_internal_errors && err.reason == ERR_INTERNAL.reason {
            return err.with_message(ERR_INTERNAL.message.clone());
        }
        err
    }
}

/// Turns a handler outcome into exactly one HTTP response.
///
/// Handlers end with a single `writer.write(result)` so no exit path can
/// write twice.
#[derive(Debug, Copy, Clone, Default)]
pub struct ResponseWriter {
    policy: ErrorPolicy,
}

impl ResponseWriter {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn write<T: Serialize>(&self, result: anyhow::Result<T>) -> Response {
        match result {
            Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
            Err(err) => self.fail(err),
        }
    }

    /// Normalize `err` through the error taxonomy and render the envelope.
    pub fn fail(&self, err: anyhow::Error) -> Response {
        let raw = format!("{err:#}");
        let errx = self.policy.apply(ErrorX::from(err));

        if errx.code >= 500 {
            tracing::error!(code = errx.code, reason = %errx.reason, error = %raw, "request failed");
        } else {
            tracing::debug!(code = errx.code, reason = %errx.reason, error = %raw, "request rejected");
        }

        let status = StatusCode::from_u16(errx.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(errx)).into_response()
    }

    /// Render an already classified error.
    pub fn error(&self, errx: ErrorX) -> Response {
        self.fail(errx.into())
    }
}
