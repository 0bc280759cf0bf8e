//! Storage collaborator: user and post persistence.
//!
//! Creates are two-phase: the row is inserted, its auto-increment key is
//! turned into a public ID through [`blogline_core::rid`], and the ID is
//! written back, all inside one unit of work.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use blogline_core::{NewPost, NewUser, Post, RidError, User};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::{PgStore, ensure_schema};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to assign public id: {0}")]
    IdAssignment(#[from] RidError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Offset/limit window for list queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 10 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserLookup<'a> {
    ByUserId(&'a str),
    ByUsername(&'a str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub page: Page,
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    /// Deleting a missing user is not an error.
    async fn delete(&self, user_id: &str) -> Result<(), StoreError>;
    async fn get(&self, lookup: UserLookup<'_>) -> Result<User, StoreError>;
    /// Total count plus one page, newest first.
    async fn list(&self, page: Page) -> Result<(i64, Vec<User>), StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;
    async fn update(&self, post: &Post) -> Result<(), StoreError>;
    /// Removes the owner's posts among `post_ids`; returns how many went away.
    async fn delete(&self, owner: &str, post_ids: &[String]) -> Result<u64, StoreError>;
    async fn get(&self, owner: &str, post_id: &str) -> Result<Post, StoreError>;
    async fn list(&self, owner: &str, query: &PostQuery) -> Result<(i64, Vec<Post>), StoreError>;
    async fn count_by_user(&self, user_id: &str) -> Result<i64, StoreError>;
}

/// Entry point handed to the business layer.
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserStore;
    fn posts(&self) -> &dyn PostStore;
}

impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn users(&self) -> &dyn UserStore {
        (**self).users()
    }

    fn posts(&self) -> &dyn PostStore {
        (**self).posts()
    }
}
