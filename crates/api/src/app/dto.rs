use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use blogline_core::{Post, User};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// `?offset=&limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListUserRequest {
    pub offset: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    #[serde(rename = "postIDs")]
    pub post_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListPostRequest {
    pub offset: i64,
    pub limit: Option<i64>,
    pub title: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expire_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Body of mutations that return nothing but success.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GetUserResponse {
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUserResponse {
    pub total_count: i64,
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    #[serde(rename = "postID")]
    pub post_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInfo {
    #[serde(rename = "postID")]
    pub post_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GetPostResponse {
    pub post: PostInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostResponse {
    pub total_count: i64,
    pub posts: Vec<PostInfo>,
}

// -------------------------
// Model -> DTO
// -------------------------

pub fn user_to_info(user: User, post_count: i64) -> UserInfo {
    UserInfo {
        user_id: user.user_id,
        username: user.username,
        nickname: user.nickname,
        email: user.email,
        phone: user.phone,
        post_count,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

pub fn post_to_info(post: Post) -> PostInfo {
    PostInfo {
        post_id: post.post_id,
        user_id: post.user_id,
        title: post.title,
        content: post.content,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}
