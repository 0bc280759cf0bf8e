//! Structural request checks. Failures are `InvalidArgument` with a message
//! naming the offending field.

use blogline_core::errorx::{ErrorX, ERR_INVALID_ARGUMENT};

use crate::app::dto::{
    ChangePasswordRequest, CreatePostRequest, CreateUserRequest, DeletePostRequest,
    UpdatePostRequest, UpdateUserRequest,
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 64;

// Column widths of the `users`/`posts` tables, in characters.
const USERNAME_MAX: usize = 255;
const NICKNAME_MAX: usize = 32;
const EMAIL_MAX: usize = 256;
const PHONE_MAX: usize = 16;
const TITLE_MAX: usize = 256;

fn invalid(message: impl Into<String>) -> ErrorX {
    ERR_INVALID_ARGUMENT.with_message(message.into())
}

fn require(field: &str, value: &str) -> Result<(), ErrorX> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> Result<(), ErrorX> {
    if value.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

/// Non-empty and no wider than its column.
fn bounded(field: &str, value: &str, max: usize) -> Result<(), ErrorX> {
    require(field, value)?;
    max_len(field, value, max)
}

fn password(field: &str, value: &str) -> Result<(), ErrorX> {
    let len = value.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(invalid(format!(
            "{field} must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

fn nickname(value: &str) -> Result<(), ErrorX> {
    max_len("nickname", value, NICKNAME_MAX)
}

pub fn create_user(req: &CreateUserRequest) -> Result<(), ErrorX> {
    bounded("username", &req.username, USERNAME_MAX)?;
    password("password", &req.password)?;
    if let Some(nick) = &req.nickname {
        nickname(nick)?;
    }
    bounded("email", &req.email, EMAIL_MAX)?;
    bounded("phone", &req.phone, PHONE_MAX)
}

pub fn update_user(req: &UpdateUserRequest) -> Result<(), ErrorX> {
    if let Some(username) = &req.username {
        bounded("username", username, USERNAME_MAX)?;
    }
    if let Some(nick) = &req.nickname {
        nickname(nick)?;
    }
    if let Some(email) = &req.email {
        bounded("email", email, EMAIL_MAX)?;
    }
    if let Some(phone) = &req.phone {
        bounded("phone", phone, PHONE_MAX)?;
    }
    Ok(())
}

pub fn change_password(req: &ChangePasswordRequest) -> Result<(), ErrorX> {
    require("oldPassword", &req.old_password)?;
    password("newPassword", &req.new_password)
}

pub fn create_post(req: &CreatePostRequest) -> Result<(), ErrorX> {
    bounded("title", &req.title, TITLE_MAX)?;
    require("content", &req.content)
}

pub fn update_post(req: &UpdatePostRequest) -> Result<(), ErrorX> {
    if let Some(title) = &req.title {
        bounded("title", title, TITLE_MAX)?;
    }
    Ok(())
}

pub fn delete_posts(req: &DeletePostRequest) -> Result<(), ErrorX> {
    if req.post_ids.is_empty() {
        return Err(invalid("postIDs cannot be empty"));
    }
    Ok(())
}

/// Resolve `offset`/`limit` query values into a page window.
pub fn page(offset: i64, limit: Option<i64>) -> Result<(i64, i64), ErrorX> {
    if offset < 0 {
        return Err(invalid("offset cannot be negative"));
    }
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(invalid(format!("limit must be between 1 and {MAX_LIMIT}")));
    }
    Ok((offset, limit))
}
