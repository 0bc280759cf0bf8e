//! `blogline-core` — shared building blocks with no transport or storage concerns.

pub mod errorx;
pub mod model;
pub mod rid;

pub use errorx::{Code, ErrorX};
pub use model::{NewPost, NewUser, Post, User};
pub use rid::{ResourceKind, RidError};
