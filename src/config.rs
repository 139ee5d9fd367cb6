use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_home_url: String,
    pub tmdb_image_url: String,
    pub tmdb_rps: u32,
    pub sync_interval_minutes: u64,
    pub sync_page_size: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://groupwatch.db?mode=rwc".to_string());

        let tmdb_access_token = std::env::var("TMDB_ACCESS_TOKEN").context("TMDB_ACCESS_TOKEN")?;
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_home_url = std::env::var("TMDB_HOME_URL")
            .unwrap_or_else(|_| "https://www.themoviedb.org".to_string());
        let tmdb_image_url = std::env::var("TMDB_IMAGE_URL")
            .unwrap_or_else(|_| "https://image.tmdb.org".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let sync_interval_minutes: u64 =
            std::env::var("SYNC_INTERVAL_MINUTES").ok().and_then(|s| s.parse().ok()).unwrap_or(15);

        let sync_page_size: u64 =
            std::env::var("SYNC_PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(50);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_home_url,
            tmdb_image_url,
            tmdb_rps,
            sync_interval_minutes,
            sync_page_size,
        })
    }
}
