//! Group aggregation and ranking.
//!
//! Builds the shared watchlist view for a group and applies the vote and
//! watch write-throughs that keep external catalog watchlists in step with
//! the local graph.

use std::collections::{HashMap, HashSet};

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{
    error::{GroupError, StoreError},
    models::{
        Availability, Movie, MovieView, MyVote, ProviderFilter, ProviderView, ProvidersView,
        TmdbAccount, Vote, VoteValue, VotesView, VoterView, WatchRecord, Watchlist,
    },
    store,
    tmdb::CatalogApi,
};

pub struct GroupService<C: CatalogApi> {
    db: DatabaseConnection,
    catalog: C,
    image_base_url: String,
    catalog_home_url: String,
}

impl<C: CatalogApi> GroupService<C> {
    pub fn new(
        db: DatabaseConnection,
        catalog: C,
        image_base_url: String,
        catalog_home_url: String,
    ) -> Self {
        Self { db, catalog, image_base_url, catalog_home_url }
    }

    /// The group's shared watchlist, ranked for the viewing user.
    pub async fn get_group_content(
        &self,
        group_id: &Uuid,
        current_user_id: &str,
    ) -> Result<Vec<MovieView>, GroupError> {
        let watchlist = store::watchlists::get_watchlist_details(&self.db, group_id).await?;
        let movies = store::movies::get_all_movies_for_watchlist(&self.db, group_id).await?;

        let member_ids: Vec<String> = watchlist.users.iter().map(|u| u.id.clone()).collect();
        let movie_ids: Vec<i32> = movies.iter().map(|m| m.id).collect();

        let votes =
            store::votes::get_all_votes_of_watchlist(&self.db, &member_ids, &movie_ids).await?;
        let history =
            store::votes::get_all_watch_history_of_watchlist(&self.db, &member_ids, &movie_ids)
                .await?;
        let availabilities = store::availability::get_all_availabilities_for_movies(
            &self.db,
            &movie_ids,
            Some(&watchlist.provider_filters),
        )
        .await?;
        let collapsed = collapse_availabilities(availabilities, &watchlist.provider_filters);

        let mut views = self.build_views(
            &watchlist,
            movies,
            &votes,
            &history,
            &collapsed,
            current_user_id,
        );
        rank_views(&mut views);
        Ok(views)
    }

    fn build_views(
        &self,
        watchlist: &Watchlist,
        movies: Vec<Movie>,
        votes: &[Vote],
        history: &[WatchRecord],
        availabilities: &[Availability],
        current_user_id: &str,
    ) -> Vec<MovieView> {
        let members_by_id: HashMap<&str, &crate::models::User> =
            watchlist.users.iter().map(|u| (u.id.as_str(), u)).collect();
        let watched_pairs: HashSet<(&str, i32)> =
            history.iter().map(|h| (h.user_id.as_str(), h.movie_id)).collect();

        let mut availability_by_movie: HashMap<i32, Vec<&Availability>> = HashMap::new();
        for availability in availabilities {
            availability_by_movie.entry(availability.movie_id).or_default().push(availability);
        }
        let mut votes_by_movie: HashMap<i32, Vec<&Vote>> = HashMap::new();
        for vote in votes {
            votes_by_movie.entry(vote.movie_id).or_default().push(vote);
        }

        movies
            .into_iter()
            .map(|movie| {
                let mut providers = ProvidersView::default();
                for availability in
                    availability_by_movie.get(&movie.id).map(Vec::as_slice).unwrap_or_default()
                {
                    let view = ProviderView {
                        provider_id: availability.provider.id,
                        name: availability.provider.name.clone(),
                        logo_path: self.image_url(&availability.provider.logo_path),
                    };
                    if availability.watch_type.is_stream() {
                        providers.stream.push(view);
                    } else {
                        providers.buy_or_rent.push(view);
                    }
                }

                let mut votes_view = VotesView::default();
                for vote in votes_by_movie.get(&movie.id).map(Vec::as_slice).unwrap_or_default() {
                    if vote.user_id == current_user_id {
                        votes_view.my_vote = Some(match vote.vote {
                            VoteValue::Yeah => MyVote::Liked,
                            VoteValue::Nah => MyVote::Blocked,
                        });
                    }
                    let Some(user) = members_by_id.get(vote.user_id.as_str()) else {
                        continue;
                    };
                    let voter = VoterView {
                        nickname: user.nickname.clone(),
                        profile_pic: self.image_url(&user.profile_pic),
                    };
                    match vote.vote {
                        VoteValue::Yeah => votes_view.liked.push(voter),
                        // the viewer's own block is carried in my_vote only
                        VoteValue::Nah if vote.user_id != current_user_id => {
                            votes_view.blocked.push(voter)
                        }
                        VoteValue::Nah => {}
                    }
                }

                let watched = watched_pairs.contains(&(current_user_id, movie.id))
                    && votes_view.my_vote.is_none();

                MovieView {
                    id: movie.id,
                    title: movie.title.unwrap_or_default(),
                    overview: movie.overview,
                    duration: movie.duration,
                    poster_path: movie.poster_path.map(|p| self.image_url(&p)),
                    genre_names: movie.genres.into_iter().map(|g| g.name).collect(),
                    official_trailer: movie.official_trailer,
                    original_language: movie.original_language,
                    release_date: movie.release_date,
                    status: movie.status,
                    tmdb_link: format!("{}/movie/{}", self.catalog_home_url, movie.id),
                    providers,
                    votes: votes_view,
                    watched,
                }
            })
            .collect()
    }

    /// Casts a vote and mirrors it onto the user's external watchlist. The
    /// external call runs inside the vote's transaction scope, so an external
    /// failure leaves no local trace.
    pub async fn vote_for_movie_by_user(
        &self,
        user_id: &str,
        movie_id: i32,
        vote_raw: &str,
    ) -> Result<(), GroupError> {
        let vote = VoteValue::from_request(vote_raw)
            .ok_or_else(|| GroupError::InvalidVote(vote_raw.to_string()))?;
        let account = self.require_account(user_id).await?;

        let tx = self.db.begin().await?;
        store::votes::vote_for_movie(&tx, user_id, movie_id, vote).await?;
        self.mirror_and_commit(
            tx,
            vec![(account, movie_id, vote == VoteValue::Yeah)],
        )
        .await
    }

    /// Marks a movie watched for one user and removes it from their external
    /// watchlist, all or nothing.
    pub async fn watch_movie_by_user(
        &self,
        user_id: &str,
        movie_id: i32,
    ) -> Result<(), GroupError> {
        let account = self.require_account(user_id).await?;

        let tx = self.db.begin().await?;
        store::votes::mark_movie_as_watched(&tx, user_id, movie_id).await?;
        self.mirror_and_commit(tx, vec![(account, movie_id, false)]).await
    }

    /// Marks a movie watched for every member of the group. The acting user
    /// must be a member; nothing is written otherwise. Members without a
    /// linked account get the history write only.
    pub async fn watch_movie_by_group(
        &self,
        group_id: &Uuid,
        acting_user_id: &str,
        movie_id: i32,
    ) -> Result<(), GroupError> {
        let watchlist = store::watchlists::get_watchlist_details(&self.db, group_id).await?;
        if !watchlist.users.iter().any(|u| u.id == acting_user_id) {
            return Err(GroupError::NotAMember);
        }

        let tx = self.db.begin().await?;
        let mut mirror = Vec::new();
        for member in &watchlist.users {
            store::votes::mark_movie_as_watched(&tx, &member.id, movie_id).await?;
            match store::users::get_tmdb_account(&tx, &member.id).await {
                Ok(account) => mirror.push((account, movie_id, false)),
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.mirror_and_commit(tx, mirror).await
    }

    pub async fn get_primary_group(&self, user_id: &str) -> Result<Uuid, GroupError> {
        Ok(store::watchlists::get_primary_watchlist_id(&self.db, user_id).await?)
    }

    async fn require_account(&self, user_id: &str) -> Result<TmdbAccount, GroupError> {
        match store::users::get_tmdb_account(&self.db, user_id).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound(_)) => Err(GroupError::MissingExternalLink),
            Err(err) => Err(err.into()),
        }
    }

    /// Pushes the queued external watchlist mutations, committing the open
    /// transaction only if every one of them succeeds.
    async fn mirror_and_commit(
        &self,
        tx: DatabaseTransaction,
        mutations: Vec<(TmdbAccount, i32, bool)>,
    ) -> Result<(), GroupError> {
        for (account, movie_id, on_list) in &mutations {
            if let Err(err) = self
                .catalog
                .set_watchlist_state(account.tmdb_id, &account.session, *movie_id, *on_list)
                .await
            {
                tx.rollback().await?;
                return Err(GroupError::ExternalSyncFailed(err));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    fn image_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}/t/p/original{}", self.image_base_url, path)
        } else {
            path.to_string()
        }
    }
}

/// Keeps at most one availability row per (movie, provider): the row whose
/// (provider, location) filter carries the lowest priority number. On equal
/// priority the last row seen wins.
fn collapse_availabilities(
    availabilities: Vec<Availability>,
    filters: &[ProviderFilter],
) -> Vec<Availability> {
    let priority: HashMap<(i32, &str), i32> =
        filters.iter().map(|f| ((f.provider_id, f.location.as_str()), f.priority)).collect();

    let mut best: HashMap<(i32, i32), (i32, Availability)> = HashMap::new();
    for availability in availabilities {
        let p = priority
            .get(&(availability.provider.id, availability.location.as_str()))
            .copied()
            .unwrap_or(i32::MAX);
        let key = (availability.movie_id, availability.provider.id);
        match best.get(&key) {
            Some((existing, _)) if p > *existing => {}
            _ => {
                best.insert(key, (p, availability));
            }
        }
    }

    let mut rows: Vec<Availability> = best.into_values().map(|(_, row)| row).collect();
    rows.sort_by(|a, b| {
        a.movie_id.cmp(&b.movie_id).then_with(|| a.provider.name.cmp(&b.provider.name))
    });
    rows
}

/// Four stable passes, least significant first, so each later key dominates
/// the ones before it.
fn rank_views(views: &mut [MovieView]) {
    views.sort_by(|a, b| a.title.cmp(&b.title));
    views.sort_by_key(|v| std::cmp::Reverse(v.votes.liked.len()));
    views.sort_by_key(|v| std::cmp::Reverse(availability_score(&v.providers)));
    views.sort_by_key(|v| std::cmp::Reverse(viewer_relevance(v)));
}

fn availability_score(providers: &ProvidersView) -> u8 {
    if !providers.stream.is_empty() {
        2
    } else if !providers.buy_or_rent.is_empty() {
        1
    } else {
        0
    }
}

fn viewer_relevance(view: &MovieView) -> u8 {
    match view.votes.my_vote {
        Some(MyVote::Liked) => 2,
        Some(MyVote::Blocked) => 0,
        None if view.watched => 1,
        None => 3,
    }
}
