use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use blogline_core::rid;
use blogline_core::{NewPost, NewUser, Post, User};

use super::{Page, PostQuery, PostStore, Store, StoreError, UserLookup, UserStore};

/// In-memory store for tests/dev.
///
/// Rows are keyed by their auto-increment id, so iteration order is insertion
/// order and lists are produced newest first by walking backwards.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: InMemoryUsers,
    posts: InMemoryPosts,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn users(&self) -> &dyn UserStore {
        &self.users
    }

    fn posts(&self) -> &dyn PostStore {
        &self.posts
    }
}

#[derive(Debug)]
struct Table<T> {
    last_id: i64,
    rows: BTreeMap<i64, T>,
}

// Derived Default would demand `T: Default`, which rows don't implement.
impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

fn read<T>(lock: &RwLock<Table<T>>) -> Result<RwLockReadGuard<'_, Table<T>>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<Table<T>>) -> Result<RwLockWriteGuard<'_, Table<T>>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn window<T: Clone>(rows: Vec<&T>, page: Page) -> (i64, Vec<T>) {
    let total = rows.len() as i64;
    let offset = page.offset.max(0) as usize;
    let limit = page.limit.max(0) as usize;
    let items = rows.into_iter().skip(offset).take(limit).cloned().collect();
    (total, items)
}

#[derive(Debug, Default)]
struct InMemoryUsers {
    inner: RwLock<Table<User>>,
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = write(&self.inner)?;
        if table.rows.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(format!("username {}", user.username)));
        }

        let id = table.last_id + 1;
        let user_id = rid::USER.from_key(id)?;
        table.last_id = id;

        let now = Utc::now();
        let row = User {
            id,
            user_id,
            username: user.username,
            password: user.password,
            nickname: user.nickname,
            email: user.email,
            phone: user.phone,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut table = write(&self.inner)?;
        if table
            .rows
            .values()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(StoreError::Duplicate(format!("username {}", user.username)));
        }
        let row = table.rows.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        *row = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        let mut table = write(&self.inner)?;
        table.rows.retain(|_, u| u.user_id != user_id);
        Ok(())
    }

    async fn get(&self, lookup: UserLookup<'_>) -> Result<User, StoreError> {
        let table = read(&self.inner)?;
        table
            .rows
            .values()
            .find(|u| match lookup {
                UserLookup::ByUserId(id) => u.user_id == id,
                UserLookup::ByUsername(name) => u.username == name,
            })
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, page: Page) -> Result<(i64, Vec<User>), StoreError> {
        let table = read(&self.inner)?;
        Ok(window(table.rows.values().rev().collect(), page))
    }
}

#[derive(Debug, Default)]
struct InMemoryPosts {
    inner: RwLock<Table<Post>>,
}

#[async_trait]
impl PostStore for InMemoryPosts {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut table = write(&self.inner)?;
        let id = table.last_id + 1;
        let post_id = rid::POST.from_key(id)?;
        table.last_id = id;

        let now = Utc::now();
        let row = Post {
            id,
            post_id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, post: &Post) -> Result<(), StoreError> {
        let mut table = write(&self.inner)?;
        let row = table
            .rows
            .get_mut(&post.id)
            .filter(|p| p.user_id == post.user_id)
            .ok_or(StoreError::NotFound)?;
        *row = Post {
            updated_at: Utc::now(),
            ..post.clone()
        };
        Ok(())
    }

    async fn delete(&self, owner: &str, post_ids: &[String]) -> Result<u64, StoreError> {
        let mut table = write(&self.inner)?;
        let before = table.rows.len();
        table
            .rows
            .retain(|_, p| !(p.user_id == owner && post_ids.contains(&p.post_id)));
        Ok((before - table.rows.len()) as u64)
    }

    async fn get(&self, owner: &str, post_id: &str) -> Result<Post, StoreError> {
        let table = read(&self.inner)?;
        table
            .rows
            .values()
            .find(|p| p.user_id == owner && p.post_id == post_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, owner: &str, query: &PostQuery) -> Result<(i64, Vec<Post>), StoreError> {
        let table = read(&self.inner)?;
        let needle = query.title.as_deref().map(str::to_lowercase);
        let rows = table
            .rows
            .values()
            .rev()
            .filter(|p| p.user_id == owner)
            .filter(|p| match &needle {
                Some(n) => p.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        Ok(window(rows, query.page))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let table = read(&self.inner)?;
        Ok(table.rows.values().filter(|p| p.user_id == user_id).count() as i64)
    }
}
