//! Periodic movie cache synchronization.
//!
//! Walks every linked catalog account page by page, mirrors external
//! watchlists into votes, refreshes stale movie details, then rebuilds
//! availability edges and runs the retention sweep.

use std::collections::{HashMap, HashSet};

use jiff::Timestamp;
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::{
    error::{CatalogError, SyncError},
    models::{Availability, Genre, Movie, Provider, VoteValue},
    store,
    tmdb::{CatalogApi, MovieDetails},
};

pub struct Synchronizer<C: CatalogApi> {
    db: DatabaseConnection,
    catalog: C,
    page_size: u64,
    lease: tokio::sync::Mutex<()>,
}

impl<C: CatalogApi> Synchronizer<C> {
    pub fn new(db: DatabaseConnection, catalog: C, page_size: u64) -> Self {
        Self { db, catalog, page_size: page_size.max(1), lease: tokio::sync::Mutex::new(()) }
    }

    /// One full cache update pass.
    ///
    /// A catalog failure inside a page's scope rolls that page back and the
    /// job moves on; the run is still reported failed at the end. Store and
    /// transaction failures abort immediately, as does any failure in the
    /// global phases (availability refresh, retention sweep). An overlapping
    /// invocation is refused rather than run concurrently.
    pub async fn movie_cache_update_job(&self) -> Result<(), SyncError> {
        let _lease = self.lease.try_lock().map_err(|_| SyncError::AlreadyRunning)?;

        let started = Timestamp::now();
        let account_count = store::users::count_tmdb_accounts(&self.db).await?;
        tracing::info!(account_count, "movie cache update started");

        let mut touched: HashSet<i32> = HashSet::new();
        let mut failed = 0usize;
        let mut total = 0usize;
        let mut offset = 0u64;
        while offset < account_count {
            total += 1;
            match self.process_page(offset, started, &mut touched).await {
                Ok(()) => {}
                Err(SyncError::Catalog(err)) => {
                    tracing::warn!(offset, error = %err, "account page skipped");
                    failed += 1;
                }
                Err(err) => return Err(err),
            }
            offset += self.page_size;
        }

        self.refresh_availability(&touched, started).await?;

        let (deleted, stripped) =
            store::movies::delete_details_of_obsolete_movies(&self.db, started).await?;
        tracing::info!(deleted, stripped, "retention sweep finished");

        if failed > 0 {
            return Err(SyncError::PagesFailed { failed, total });
        }
        tracing::info!(movies = touched.len(), "movie cache update finished");
        Ok(())
    }

    /// Handles one page of accounts: external watchlist fetches and detail
    /// fetches happen before the page's write transaction opens, so no store
    /// transaction ever waits on the network.
    async fn process_page(
        &self,
        offset: u64,
        now: Timestamp,
        touched: &mut HashSet<i32>,
    ) -> Result<(), SyncError> {
        let accounts = store::users::get_tmdb_accounts_page(&self.db, offset, self.page_size).await?;

        let mut per_user: Vec<(String, Vec<i32>)> = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let ids =
                self.catalog.get_watchlist_movies(account.tmdb_id, &account.session).await?;
            per_user.push((account.user_id.clone(), ids));
        }

        let mut watchlisted: Vec<i32> = Vec::new();
        let mut seen = HashSet::new();
        for (_, ids) in &per_user {
            for id in ids {
                if seen.insert(*id) {
                    watchlisted.push(*id);
                }
            }
        }

        let stale =
            store::movies::keep_movie_ids_where_update_is_needed(&self.db, &watchlisted, now)
                .await?;
        tracing::debug!(offset, watchlisted = watchlisted.len(), stale = stale.len(), "page scoped");

        let mut fetched = Vec::with_capacity(stale.len());
        for movie_id in stale {
            let details = self.catalog.get_movie(movie_id).await?;
            let trailer = match self.catalog.get_trailer(movie_id).await {
                Ok(url) => Some(url),
                Err(CatalogError::NoTrailer) => None,
                Err(err) => return Err(err.into()),
            };
            fetched.push(movie_from_details(details, trailer, now));
        }

        let tx = self.db.begin().await?;
        for movie in &fetched {
            store::movies::save_or_update_movie(&tx, movie).await?;
        }
        for (user_id, ids) in &per_user {
            for movie_id in ids {
                store::votes::vote_for_movie(&tx, user_id, *movie_id, VoteValue::Yeah).await?;
            }
        }
        tx.commit().await?;

        touched.extend(watchlisted);
        Ok(())
    }

    /// Rebuilds availability edges for every movie touched this run, driven
    /// by the union of all watchlists' provider filters keyed by location.
    async fn refresh_availability(
        &self,
        touched: &HashSet<i32>,
        now: Timestamp,
    ) -> Result<(), SyncError> {
        if touched.is_empty() {
            return Ok(());
        }
        let filters = store::watchlists::get_all_provider_filters(&self.db).await?;
        let mut by_location: HashMap<&str, HashSet<i32>> = HashMap::new();
        for filter in &filters {
            by_location.entry(filter.location.as_str()).or_default().insert(filter.provider_id);
        }

        let mut movie_ids: Vec<i32> = touched.iter().copied().collect();
        movie_ids.sort_unstable();

        let mut batch: Vec<Availability> = Vec::new();
        if !by_location.is_empty() {
            for movie_id in &movie_ids {
                let table = self.catalog.get_watch_providers(*movie_id).await?;
                for (location, wanted) in &by_location {
                    let Some(offers) = table.get(*location) else {
                        continue;
                    };
                    for (watch_type, entries) in offers.cells() {
                        for entry in entries {
                            if !wanted.contains(&entry.provider_id) {
                                continue;
                            }
                            batch.push(Availability {
                                provider: Provider {
                                    id: entry.provider_id,
                                    name: entry.provider_name.clone(),
                                    logo_path: entry.logo_path.clone().unwrap_or_default(),
                                    updated_at: now.as_second(),
                                },
                                movie_id: *movie_id,
                                location: (*location).to_string(),
                                watch_type,
                                updated_at: now.as_second(),
                            });
                        }
                    }
                }
            }
        }

        let tx = self.db.begin().await?;
        store::availability::save_movie_availabilities(&tx, &movie_ids, &batch).await?;
        tx.commit().await?;
        tracing::debug!(edges = batch.len(), movies = movie_ids.len(), "availability refreshed");
        Ok(())
    }
}

fn movie_from_details(details: MovieDetails, trailer: Option<String>, now: Timestamp) -> Movie {
    Movie {
        id: details.id,
        title: Some(details.title),
        overview: details.overview,
        duration: details.runtime,
        poster_path: details.poster_path,
        genres: details
            .genres
            .into_iter()
            .map(|g| Genre { id: g.id, name: g.name })
            .collect(),
        official_trailer: trailer,
        original_language: details.original_language,
        release_date: details
            .release_date
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| raw.parse().ok()),
        status: details.status,
        updated_at: Some(now.as_second()),
    }
}
