use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::middleware::{self, AuthState};

pub mod auth;
pub mod common;
pub mod posts;
pub mod system;
pub mod users;

/// Route table. Protected routes carry the authentication interceptor as a
/// route layer, so unauthenticated requests never reach their handlers.
///
/// A known path hit with an unsupported method gets the same "Page not found"
/// envelope as an unknown path.
pub fn router(auth_state: AuthState) -> Router {
    let authn = from_fn_with_state(auth_state, middleware::authn);

    Router::new()
        .route(
            "/healthz",
            get(system::healthz).fallback(system::not_found),
        )
        .route("/login", post(auth::login).fallback(system::not_found))
        .route(
            "/refresh-token",
            post(auth::refresh_token)
                .route_layer(authn.clone())
                .fallback(system::not_found),
        )
        .route(
            "/v1/users",
            post(users::create_user)
                .merge(get(users::list_users).route_layer(authn.clone()))
                .fallback(system::not_found),
        )
        .route(
            "/v1/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user)
                .route_layer(authn.clone())
                .fallback(system::not_found),
        )
        .route(
            "/v1/users/:user_id/change-password",
            put(users::change_password)
                .route_layer(authn.clone())
                .fallback(system::not_found),
        )
        .route(
            "/v1/posts",
            post(posts::create_post)
                .get(posts::list_posts)
                .delete(posts::delete_posts)
                .route_layer(authn.clone())
                .fallback(system::not_found),
        )
        .route(
            "/v1/posts/:post_id",
            get(posts::get_post)
                .put(posts::update_post)
                .route_layer(authn)
                .fallback(system::not_found),
        )
        .fallback(system::not_found)
}
