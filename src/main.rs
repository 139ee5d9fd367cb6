use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod entities;
mod error;
mod groups;
mod models;
mod routes;
mod store;
mod sync;
mod tmdb;

use crate::{
    config::Config,
    error::SyncError,
    groups::GroupService,
    routes::AppState,
    sync::Synchronizer,
    tmdb::TmdbClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groupwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = db::connect_and_migrate(&config.database_url).await?;

    let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    let catalog = TmdbClient::new(
        http,
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );

    let groups = Arc::new(GroupService::new(
        db.clone(),
        catalog.clone(),
        config.tmdb_image_url.clone(),
        config.tmdb_home_url.clone(),
    ));
    let sync = Arc::new(Synchronizer::new(db, catalog, config.sync_page_size));

    tokio::spawn(run_sync_loop(sync.clone(), config.sync_interval_minutes));

    let app = routes::router(AppState { groups, sync })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_sync_loop(sync: Arc<Synchronizer<TmdbClient>>, interval_minutes: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match sync.movie_cache_update_job().await {
            Ok(()) => {}
            Err(SyncError::AlreadyRunning) => {
                tracing::warn!("previous cache update still running, tick skipped")
            }
            Err(err) => tracing::error!(error = %err, "movie cache update failed"),
        }
    }
}
