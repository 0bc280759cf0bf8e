//! Infrastructure layer: database pool wiring and the user/post stores.

pub mod db;
pub mod store;

pub use db::{DbConfigError, PostgresOptions};
pub use store::{
    InMemoryStore, Page, PgStore, PostQuery, PostStore, Store, StoreError, UserLookup, UserStore,
    ensure_schema,
};
