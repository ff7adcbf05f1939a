use miette::{IntoDiagnostic, Result, WrapErr};
use oauth2_server::{GrantStore, OAuth2Server};
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;

mod config;
mod db;
mod seed;
mod store;

use config::AppConfig;
use store::SqliteStore;

/// Periodically drop grants that can no longer be exchanged.
fn spawn_grant_purge<S>(store: Arc<S>, lifetime: chrono::Duration, every: Duration)
where
    S: GrantStore + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store
                .purge_expired_grants(chrono::Utc::now() - lifetime)
                .await
            {
                Ok(0) => {}
                Ok(purged) => tracing::debug!("purged {} expired grants", purged),
                Err(e) => tracing::error!("grant purge failed: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::filter::EnvFilter::new(
                    "auth_server=debug,oauth2_server=debug,tower_http=debug,info",
                )
            }),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::init_db(&config.database_url)
        .await
        .wrap_err_with(|| format!("opening database {}", config.database_url))?;
    let store = SqliteStore::new(pool);

    if let Some(path) = &config.seed_file {
        seed::Seed::from_file(path)?.apply(&store).await?;
    }

    let server_config = config.server_config();
    spawn_grant_purge(
        store.clone(),
        server_config.grant_lifetime,
        config.purge_interval,
    );

    let server = OAuth2Server::builder()
        .config(server_config)
        .store(store)
        .build()
        .into_diagnostic()?;

    let app = server.router().layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .into_diagnostic()?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;
    Ok(())
}
