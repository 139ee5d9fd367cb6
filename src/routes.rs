//! Thin HTTP surface over the group service and the synchronizer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppResult,
    groups::GroupService,
    models::{MovieView, VoteRequest, WatchRequest},
    sync::Synchronizer,
    tmdb::TmdbClient,
};

#[derive(Clone)]
pub struct AppState {
    pub groups: Arc<GroupService<TmdbClient>>,
    pub sync: Arc<Synchronizer<TmdbClient>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/groups/{group_id}/content", get(group_content))
        .route("/api/groups/{group_id}/watch", post(watch_by_group))
        .route("/api/votes", post(cast_vote))
        .route("/api/watched", post(mark_watched))
        .route("/api/users/{user_id}/primary-group", get(primary_group))
        .route("/api/sync", post(trigger_sync))
        .with_state(state)
}

#[derive(Deserialize)]
struct ContentQuery {
    user_id: String,
}

async fn group_content(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ContentQuery>,
) -> AppResult<Json<Vec<MovieView>>> {
    let views = state.groups.get_group_content(&group_id, &query.user_id).await?;
    Ok(Json(views))
}

async fn cast_vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> AppResult<StatusCode> {
    state.groups.vote_for_movie_by_user(&req.user_id, req.movie_id, &req.vote).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_watched(
    State(state): State<AppState>,
    Json(req): Json<WatchRequest>,
) -> AppResult<StatusCode> {
    state.groups.watch_movie_by_user(&req.user_id, req.movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn watch_by_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<WatchRequest>,
) -> AppResult<StatusCode> {
    state.groups.watch_movie_by_group(&group_id, &req.user_id, req.movie_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn primary_group(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let group_id = state.groups.get_primary_group(&user_id).await?;
    Ok(Json(json!({ "group_id": group_id })))
}

async fn trigger_sync(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.sync.movie_cache_update_job().await?;
    Ok(StatusCode::NO_CONTENT)
}
