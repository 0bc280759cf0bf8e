//! Business layer between handlers and the store.
//!
//! Every operation returns `anyhow::Result`. Classified failures are raised
//! as `ErrorX` values; anything else (store outages, join errors) travels
//! unclassified and is normalized by the response writer.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};

use blogline_auth::{password, PasswordError, TokenIssuer};
use blogline_core::errorx::{
    ErrorX, ERR_PASSWORD_INVALID, ERR_PERMISSION_DENIED, ERR_POST_NOT_FOUND, ERR_SIGN_TOKEN,
    ERR_UNAUTHENTICATED, ERR_USER_ALREADY_EXISTS, ERR_USER_NOT_FOUND,
};
use blogline_core::{NewPost, NewUser};
use blogline_infra::{Page, PostQuery, Store, StoreError, UserLookup};

use crate::app::dto::{
    self, ChangePasswordRequest, CreatePostRequest, CreatePostResponse, CreateUserRequest,
    CreateUserResponse, DeletePostRequest, Empty, GetPostResponse, GetUserResponse,
    ListPostResponse, ListUserResponse, LoginRequest, TokenResponse, UpdatePostRequest,
    UpdateUserRequest,
};
use crate::context::RequestContext;

/// Upper bound on store calls issued concurrently while assembling one list response.
pub const MAX_CONCURRENT_LOOKUPS: usize = 10;

pub struct AppServices {
    store: Arc<dyn Store>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    pub fn users(&self) -> UserService<'_> {
        UserService { svc: self }
    }

    pub fn posts(&self) -> PostService<'_> {
        PostService { svc: self }
    }

    fn issue_token(&self, user_id: &str) -> anyhow::Result<TokenResponse> {
        let issued = self.tokens.issue(user_id, Utc::now()).map_err(|err| {
            tracing::error!(error = %err, "failed to sign token");
            ERR_SIGN_TOKEN
        })?;
        Ok(TokenResponse {
            token: issued.token,
            expire_at: issued.expires_at,
        })
    }
}

fn current_user(ctx: &RequestContext) -> Result<&str, ErrorX> {
    match ctx.user_id() {
        "" => Err(ERR_UNAUTHENTICATED),
        id => Ok(id),
    }
}

/// Users may only mutate their own account.
fn ensure_self(ctx: &RequestContext, user_id: &str) -> Result<(), ErrorX> {
    if current_user(ctx)? != user_id {
        return Err(ERR_PERMISSION_DENIED);
    }
    Ok(())
}

fn user_store_error(err: StoreError) -> anyhow::Error {
    match err {
        StoreError::NotFound => ERR_USER_NOT_FOUND.into(),
        StoreError::Duplicate(_) => ERR_USER_ALREADY_EXISTS.into(),
        other => anyhow::Error::new(other),
    }
}

fn post_store_error(err: StoreError) -> anyhow::Error {
    match err {
        StoreError::NotFound => ERR_POST_NOT_FOUND.into(),
        other => anyhow::Error::new(other),
    }
}

// argon2 is CPU-bound; keep it off the async workers.
async fn hash_password(plain: String) -> anyhow::Result<String> {
    let hashed = tokio::task::spawn_blocking(move || password::encrypt(&plain))
        .await
        .context("password hashing task failed")??;
    Ok(hashed)
}

async fn verify_password(hashed: String, plain: String) -> anyhow::Result<()> {
    let outcome = tokio::task::spawn_blocking(move || password::compare(&hashed, &plain))
        .await
        .context("password verification task failed")?;
    match outcome {
        Ok(()) => Ok(()),
        Err(PasswordError::Mismatch) => Err(ERR_PASSWORD_INVALID.into()),
        Err(err) => Err(err.into()),
    }
}

pub struct UserService<'a> {
    svc: &'a AppServices,
}

impl UserService<'_> {
    pub async fn create(&self, req: CreateUserRequest) -> anyhow::Result<CreateUserResponse> {
        let password = hash_password(req.password).await?;
        let user = self
            .svc
            .store
            .users()
            .create(NewUser {
                username: req.username,
                password,
                nickname: req.nickname.unwrap_or_default(),
                email: req.email,
                phone: req.phone,
            })
            .await
            .map_err(user_store_error)?;

        tracing::info!(user_id = %user.user_id, "user created");
        Ok(CreateUserResponse {
            user_id: user.user_id,
        })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        req: UpdateUserRequest,
    ) -> anyhow::Result<Empty> {
        ensure_self(ctx, user_id)?;

        let users = self.svc.store.users();
        let mut user = users
            .get(UserLookup::ByUserId(user_id))
            .await
            .map_err(user_store_error)?;

        if let Some(username) = req.username {
            user.username = username;
        }
        if let Some(nickname) = req.nickname {
            user.nickname = nickname;
        }
        if let Some(email) = req.email {
            user.email = email;
        }
        if let Some(phone) = req.phone {
            user.phone = phone;
        }

        users.update(&user).await.map_err(user_store_error)?;
        Ok(Empty::default())
    }

    pub async fn delete(&self, ctx: &RequestContext, user_id: &str) -> anyhow::Result<Empty> {
        ensure_self(ctx, user_id)?;
        self.svc
            .store
            .users()
            .delete(user_id)
            .await
            .map_err(user_store_error)?;
        Ok(Empty::default())
    }

    pub async fn get(&self, user_id: &str) -> anyhow::Result<GetUserResponse> {
        let store = &self.svc.store;
        let user = store
            .users()
            .get(UserLookup::ByUserId(user_id))
            .await
            .map_err(user_store_error)?;
        let post_count = store.posts().count_by_user(&user.user_id).await?;

        Ok(GetUserResponse {
            user: dto::user_to_info(user, post_count),
        })
    }

    /// One page of users, each with its post count.
    ///
    /// Counts are fetched with at most [`MAX_CONCURRENT_LOOKUPS`] in flight and
    /// are paired back with their user in list order.
    pub async fn list(&self, page: Page) -> anyhow::Result<ListUserResponse> {
        let store = &self.svc.store;
        let (total_count, users) = store.users().list(page).await?;

        let ids: Vec<String> = users.iter().map(|user| user.user_id.clone()).collect();
        let counts: Vec<i64> = stream::iter(ids)
            .map(|id| async move { store.posts().count_by_user(&id).await })
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .try_collect()
            .await?;

        let users = users
            .into_iter()
            .zip(counts)
            .map(|(user, count)| dto::user_to_info(user, count))
            .collect();
        Ok(ListUserResponse { total_count, users })
    }

    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        req: ChangePasswordRequest,
    ) -> anyhow::Result<Empty> {
        ensure_self(ctx, user_id)?;

        let users = self.svc.store.users();
        let mut user = users
            .get(UserLookup::ByUserId(user_id))
            .await
            .map_err(user_store_error)?;

        verify_password(user.password.clone(), req.old_password).await?;
        user.password = hash_password(req.new_password).await?;

        users.update(&user).await.map_err(user_store_error)?;
        Ok(Empty::default())
    }

    pub async fn login(&self, req: LoginRequest) -> anyhow::Result<TokenResponse> {
        let user = self
            .svc
            .store
            .users()
            .get(UserLookup::ByUsername(&req.username))
            .await
            .map_err(user_store_error)?;

        verify_password(user.password, req.password).await?;
        self.svc.issue_token(&user.user_id)
    }

    pub fn refresh_token(&self, ctx: &RequestContext) -> anyhow::Result<TokenResponse> {
        let user_id = current_user(ctx)?;
        self.svc.issue_token(user_id)
    }
}

/// Post operations, always scoped to the authenticated user.
pub struct PostService<'a> {
    svc: &'a AppServices,
}

impl PostService<'_> {
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreatePostRequest,
    ) -> anyhow::Result<CreatePostResponse> {
        let owner = current_user(ctx)?;
        let post = self
            .svc
            .store
            .posts()
            .create(NewPost {
                user_id: owner.to_string(),
                title: req.title,
                content: req.content,
            })
            .await?;

        tracing::info!(post_id = %post.post_id, "post created");
        Ok(CreatePostResponse {
            post_id: post.post_id,
        })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        post_id: &str,
        req: UpdatePostRequest,
    ) -> anyhow::Result<Empty> {
        let owner = current_user(ctx)?;
        let posts = self.svc.store.posts();
        let mut post = posts.get(owner, post_id).await.map_err(post_store_error)?;

        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(content) = req.content {
            post.content = content;
        }

        posts.update(&post).await.map_err(post_store_error)?;
        Ok(Empty::default())
    }

    pub async fn delete(&self, ctx: &RequestContext, req: DeletePostRequest) -> anyhow::Result<Empty> {
        let owner = current_user(ctx)?;
        let removed = self.svc.store.posts().delete(owner, &req.post_ids).await?;
        tracing::info!(requested = req.post_ids.len(), removed, "posts deleted");
        Ok(Empty::default())
    }

    pub async fn get(&self, ctx: &RequestContext, post_id: &str) -> anyhow::Result<GetPostResponse> {
        let owner = current_user(ctx)?;
        let post = self
            .svc
            .store
            .posts()
            .get(owner, post_id)
            .await
            .map_err(post_store_error)?;
        Ok(GetPostResponse {
            post: dto::post_to_info(post),
        })
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        query: PostQuery,
    ) -> anyhow::Result<ListPostResponse> {
        let owner = current_user(ctx)?;
        let (total_count, posts) = self.svc.store.posts().list(owner, &query).await?;
        Ok(ListPostResponse {
            total_count,
            posts: posts.into_iter().map(dto::post_to_info).collect(),
        })
    }
}
