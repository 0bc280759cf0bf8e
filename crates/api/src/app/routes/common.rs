use std::fmt::Display;

use blogline_core::errorx::{ErrorX, ERR_BIND};

/// Body/query extraction failures become `BindError` carrying the rejection text.
pub fn bind_error(rejection: impl Display) -> ErrorX {
    ERR_BIND.with_message(rejection.to_string())
}
