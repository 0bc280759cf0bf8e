//! Postgres-backed store.
//!
//! Rows are read with `Row::try_get` rather than derive macros so the schema
//! stays visible next to the queries that use it.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | N/A | `Database` |

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use blogline_core::rid;
use blogline_core::{NewPost, NewUser, Post, User};

use super::{Page, PostQuery, PostStore, Store, StoreError, UserLookup, UserStore};

const SCHEMA: &str = include_str!("../../migrations/0001_blog.sql");

/// Create the `users` and `posts` tables when they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    users: PgUsers,
    posts: PgPosts,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: PgUsers { pool: pool.clone() },
            posts: PgPosts { pool },
        }
    }
}

impl Store for PgStore {
    fn users(&self) -> &dyn UserStore {
        &self.users
    }

    fn posts(&self) -> &dyn PostStore {
        &self.posts
    }
}

fn map_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
        }
        other => StoreError::Database(other),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let user_id: Option<String> = row.try_get("user_id")?;
    Ok(User {
        id: row.try_get("id")?,
        user_id: user_id.unwrap_or_default(),
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        nickname: row.try_get("nickname")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    let post_id: Option<String> = row.try_get("post_id")?;
    Ok(Post {
        id: row.try_get("id")?,
        post_id: post_id.unwrap_or_default(),
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// `ILIKE` pattern matching `needle` anywhere, with `%`, `_` and `\` taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const USER_COLUMNS: &str =
    "id, user_id, username, password, nickname, email, phone, created_at, updated_at";
const POST_COLUMNS: &str = "id, post_id, user_id, title, content, created_at, updated_at";

#[derive(Debug, Clone)]
struct PgUsers {
    pool: PgPool,
}

#[async_trait]
impl UserStore for PgUsers {
    #[instrument(skip_all, fields(username = %user.username))]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, password, nickname, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        let id: i64 = row.try_get("id").map_err(map_err)?;
        // Leaving without commit rolls the insert back.
        let user_id = rid::USER.from_key(id)?;

        sqlx::query("UPDATE users SET user_id = $1 WHERE id = $2")
            .bind(&user_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        Ok(User {
            id,
            user_id,
            username: user.username,
            password: user.password,
            nickname: user.nickname,
            email: user.email,
            phone: user.phone,
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $1, password = $2, nickname = $3, email = $4, phone = $5,
                updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, lookup: UserLookup<'_>) -> Result<User, StoreError> {
        let (column, value) = match lookup {
            UserLookup::ByUserId(id) => ("user_id", id),
            UserLookup::ByUsername(name) => ("username", name),
        };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        user_from_row(&row).map_err(map_err)
    }

    async fn list(&self, page: Page) -> Result<(i64, Vec<User>), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;

        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id DESC OFFSET $1 LIMIT $2");
        let rows = sqlx::query(&sql)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok((total, users))
    }
}

#[derive(Debug, Clone)]
struct PgPosts {
    pool: PgPool,
}

#[async_trait]
impl PostStore for PgPosts {
    #[instrument(skip_all, fields(user_id = %post.user_id))]
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let row = sqlx::query(
            r#"
            INSERT INTO posts (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        let id: i64 = row.try_get("id").map_err(map_err)?;
        let post_id = rid::POST.from_key(id)?;

        sqlx::query("UPDATE posts SET post_id = $1 WHERE id = $2")
            .bind(&post_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        Ok(Post {
            id,
            post_id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }

    async fn update(&self, post: &Post) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $1, content = $2, updated_at = NOW()
            WHERE id = $3 AND user_id = $4
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.id)
        .bind(&post.user_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, owner: &str, post_ids: &[String]) -> Result<u64, StoreError> {
        if post_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM posts WHERE user_id = $1 AND post_id = ANY($2)")
            .bind(owner)
            .bind(post_ids)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn get(&self, owner: &str, post_id: &str) -> Result<Post, StoreError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 AND post_id = $2");
        let row = sqlx::query(&sql)
            .bind(owner)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        post_from_row(&row).map_err(map_err)
    }

    async fn list(&self, owner: &str, query: &PostQuery) -> Result<(i64, Vec<Post>), StoreError> {
        const FILTER: &str =
            "user_id = $1 AND ($2::TEXT IS NULL OR title ILIKE $2::TEXT ESCAPE '\\')";
        let pattern = query.title.as_deref().map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts WHERE {FILTER}"))
            .bind(owner)
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {FILTER} ORDER BY id DESC OFFSET $3 LIMIT $4"
        );
        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(pattern.as_deref())
            .bind(query.page.offset)
            .bind(query.page.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok((total, posts))
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_pattern_escapes_like_wildcards() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }
}
