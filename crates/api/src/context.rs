//! Request-scoped values.
//!
//! A [`RequestContext`] is an immutable overlay: `with_*` returns a new
//! context whose lookups see the new binding first and fall back to the
//! parent's bindings. The parent is never touched, so a context cloned
//! before an overlay keeps seeing exactly what it saw before.

use std::any::{Any, TypeId};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Typed key for a [`RequestContext`] binding.
///
/// Each key is its own type, so a lookup can only ever return the value
/// type its key declares.
pub trait ContextKey: 'static {
    type Value: Send + Sync + 'static;
}

/// Identifier of the in-flight request (`x-request-id`).
pub struct RequestIdKey;

impl ContextKey for RequestIdKey {
    type Value = String;
}

/// Public ID of the authenticated user.
pub struct UserIdKey;

impl ContextKey for UserIdKey {
    type Value = String;
}

struct Binding {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}

#[derive(Clone, Default)]
pub struct RequestContext {
    head: Option<Arc<Binding>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// New context with `value` bound under `K`, layered over `self`.
    pub fn with<K: ContextKey>(&self, value: K::Value) -> Self {
        Self {
            head: Some(Arc::new(Binding {
                key: TypeId::of::<K>(),
                value: Box::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Nearest binding for `K`, if any.
    pub fn get<K: ContextKey>(&self) -> Option<&K::Value> {
        let wanted = TypeId::of::<K>();
        let mut node = self.head.as_deref();
        while let Some(binding) = node {
            if binding.key == wanted {
                return binding.value.downcast_ref::<K::Value>();
            }
            node = binding.parent.as_deref();
        }
        None
    }

    pub fn with_request_id(&self, id: impl Into<String>) -> Self {
        self.with::<RequestIdKey>(id.into())
    }

    /// Empty when no request ID was bound.
    pub fn request_id(&self) -> &str {
        self.get::<RequestIdKey>().map(String::as_str).unwrap_or("")
    }

    pub fn with_user_id(&self, id: impl Into<String>) -> Self {
        self.with::<UserIdKey>(id.into())
    }

    /// Empty until authentication succeeds.
    pub fn user_id(&self) -> &str {
        self.get::<UserIdKey>().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id())
            .field("user_id", &self.user_id())
            .finish()
    }
}

/// Handlers receive whatever the middleware chain bound so far; a request
/// that bypassed the chain sees an empty context.
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}
