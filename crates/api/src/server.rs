//! Server lifecycle: wire collaborators, bind, serve, drain on shutdown.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use tokio::net::TcpListener;

use blogline_auth::Hs256Jwt;
use blogline_infra::{ensure_schema, InMemoryStore, PgStore, Store};

use crate::app::{
    build_app,
    response::{ErrorPolicy, ResponseWriter},
    services::AppServices,
    AppState,
};
use crate::config::ServerConfig;

pub struct Server {
    addr: String,
    app: Router,
}

impl Server {
    /// Connect the configured store and build the router.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.database {
            Some(db) => {
                let pool = db.connect().await.context("failed to connect to postgres")?;
                ensure_schema(&pool)
                    .await
                    .context("failed to prepare database schema")?;
                tracing::info!(
                    max_connections = db.max_connections,
                    "using postgres store"
                );
                Arc::new(PgStore::new(pool))
            }
            None => {
                tracing::warn!("no database configured; data lives in memory and is lost on exit");
                Arc::new(InMemoryStore::new())
            }
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        // ttl is bounded by ServerConfig::validate
        let ttl = chrono::Duration::seconds(config.jwt.ttl_secs as i64);
        let jwt = Arc::new(Hs256Jwt::new(config.jwt.secret.as_bytes(), ttl));

        let app = build_app(AppState {
            services: Arc::new(AppServices::new(store, jwt.clone())),
            jwt,
            writer: ResponseWriter::new(ErrorPolicy {
                expose_internal_errors: config.expose_internal_errors,
            }),
            cors_origins: config.cors.allowed_origins,
        });

        Self {
            addr: config.addr,
            app,
        }
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// In-flight requests drain before this returns. A request whose client
    /// goes away is dropped, which cancels its handler future.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("server error")?;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
