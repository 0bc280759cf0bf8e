//! HTTP API: request pipeline, handlers, configuration and server lifecycle.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod server;
