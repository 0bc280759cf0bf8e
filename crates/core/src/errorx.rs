//! Error taxonomy shared by every layer of the service.
//!
//! Every failure that reaches the wire is expressed as an [`ErrorX`]:
//! a transport status `code`, a machine-matchable `reason` and a human
//! `message`. Clients branch on `reason`; `message` may vary per occurrence.

use std::borrow::Cow;
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport status codes an [`ErrorX`] may carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Code {
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    Internal = 500,
}

impl Code {
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Classified error.
///
/// Catalogue entries below are `const` values; annotating one with
/// [`ErrorX::with_message`] yields a fresh copy, so the catalogue itself is
/// never modified.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("code: {code}, reason: {reason}, message: {message}")]
pub struct ErrorX {
    /// Transport status code (see [`Code`]).
    pub code: u16,

    /// Stable, machine-matchable reason, e.g. `NotFound.UserNotFound`.
    pub reason: Cow<'static, str>,

    /// Human-readable message, safe to show to the caller.
    pub message: Cow<'static, str>,
}

const fn catalogue(code: Code, reason: &'static str, message: &'static str) -> ErrorX {
    ErrorX {
        code: code.as_u16(),
        reason: Cow::Borrowed(reason),
        message: Cow::Borrowed(message),
    }
}

/// Unclassified failure; the fallback for anything not already an [`ErrorX`].
pub const ERR_INTERNAL: ErrorX = catalogue(Code::Internal, "InternalError", "Internal server error.");

/// Route or resource absent.
pub const ERR_NOT_FOUND: ErrorX = catalogue(Code::NotFound, "NotFound", "Resource not found.");

/// Malformed request body or query.
pub const ERR_BIND: ErrorX = catalogue(
    Code::BadRequest,
    "BindError",
    "Error occurred while binding the request body to the struct.",
);

/// Semantic validation failure; usually annotated with the concrete problem.
pub const ERR_INVALID_ARGUMENT: ErrorX =
    catalogue(Code::BadRequest, "InvalidArgument", "Argument verification failed.");

pub const ERR_UNAUTHENTICATED: ErrorX = catalogue(Code::Unauthorized, "Unauthenticated", "Unauthenticated.");

/// Missing, malformed, expired or otherwise unverifiable bearer credential.
pub const ERR_TOKEN_INVALID: ErrorX =
    catalogue(Code::Unauthorized, "Unauthenticated.TokenInvalid", "Token was invalid.");

pub const ERR_PERMISSION_DENIED: ErrorX = catalogue(
    Code::Forbidden,
    "PermissionDenied",
    "Permission denied. Access to the requested resource is forbidden.",
);

pub const ERR_OPERATION_FAILED: ErrorX = catalogue(
    Code::Conflict,
    "OperationFailed",
    "The requested operation has failed. Please try again later.",
);

pub const ERR_DB_READ: ErrorX = catalogue(
    Code::Internal,
    "InternalError.DBRead",
    "Database read failure.",
);

pub const ERR_DB_WRITE: ErrorX = catalogue(
    Code::Internal,
    "InternalError.DBWrite",
    "Database write failure.",
);

pub const ERR_USER_ALREADY_EXISTS: ErrorX =
    catalogue(Code::BadRequest, "AlreadyExist.UserAlreadyExists", "User already exists.");

pub const ERR_USER_NOT_FOUND: ErrorX = catalogue(Code::NotFound, "NotFound.UserNotFound", "User not found.");

pub const ERR_PASSWORD_INVALID: ErrorX =
    catalogue(Code::Unauthorized, "Unauthenticated.PasswordInvalid", "Password is incorrect.");

pub const ERR_SIGN_TOKEN: ErrorX = catalogue(
    Code::Unauthorized,
    "Unauthenticated.SignToken",
    "Error occurred while signing the JSON web token.",
);

pub const ERR_POST_NOT_FOUND: ErrorX = catalogue(Code::NotFound, "NotFound.PostNotFound", "Post not found.");

impl ErrorX {
    /// Build an error with an already formatted message.
    ///
    /// ```
    /// use blogline_core::errorx::{Code, ErrorX};
    ///
    /// let err = ErrorX::new(Code::BadRequest, "InvalidArgument.Title", format!("title too long: {}", 300));
    /// assert_eq!(err.code, 400);
    /// ```
    pub fn new(
        code: Code,
        reason: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: code.as_u16(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Replace the message, keeping `code` and `reason`.
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = message.into();
        self
    }

    /// Classify an arbitrary error.
    ///
    /// Walks the `source()` chain looking for an [`ErrorX`] and returns the
    /// first one found unchanged. Anything else becomes [`ERR_INTERNAL`]
    /// carrying the error's display text.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(errx) = e.downcast_ref::<ErrorX>() {
                return errx.clone();
            }
            current = e.source();
        }

        ERR_INTERNAL.with_message(err.to_string())
    }

    /// `true` when two errors share code and reason (message ignored).
    pub fn is(&self, other: &ErrorX) -> bool {
        self.code == other.code && self.reason == other.reason
    }
}

/// Option-shaped classification: `None` in, `None` out.
pub fn from_error(err: Option<&(dyn StdError + 'static)>) -> Option<ErrorX> {
    err.map(ErrorX::from_error)
}

impl From<anyhow::Error> for ErrorX {
    fn from(err: anyhow::Error) -> Self {
        if let Some(errx) = err.chain().find_map(|e| e.downcast_ref::<ErrorX>()) {
            return errx.clone();
        }

        ERR_INTERNAL.with_message(err.to_string())
    }
}
