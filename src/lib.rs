pub(crate) mod api;
pub mod client;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::storage::StorageService;

/// Loads settings, wires logging and metrics, migrates the database and
/// connects the optional backends. Redis being down is not fatal.
async fn bootstrap() -> anyhow::Result<(AppState, RedisHandle)> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    match redis.connect().await {
        Ok(()) => tracing::info!("Redis connected"),
        Err(err) => {
            tracing::error!(error = %err, "Redis unavailable; rate limits and cooldowns are off")
        }
    }

    let storage = StorageService::from_settings(&settings).await?;
    if storage.is_none() {
        tracing::warn!("Object storage is not configured; file uploads will be refused");
    }

    Ok((AppState::new(settings, db_pool, redis.clone(), storage), redis))
}

pub async fn run() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;

    if let Err(err) = core::bootstrap::ensure_superuser(&state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        api_prefix = %state.settings().api().api_prefix,
        "Coursework API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    result?;
    Ok(())
}

/// Background jobs only: the deadline sweep.
pub async fn run_worker() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;
    tracing::info!("Coursework worker started");

    let result = tasks::scheduler::run(state).await;

    redis.disconnect().await;
    result
}
