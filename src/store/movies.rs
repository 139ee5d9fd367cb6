use std::collections::HashMap;

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    entities::{genres, includes, movies, votes, watch_history},
    error::StoreError,
    models::{Genre, Movie, VoteValue},
};

/// A release older than this many days counts as settled, so its cached
/// details only need a refresh every four weeks instead of daily.
const RECENT_RELEASE_DAYS: i32 = 31;
const FOUR_WEEKS_SECS: i64 = 28 * 86_400;
const ONE_DAY_SECS: i64 = 86_400;

/// Upserts the movie row and replaces its genre edges wholesale.
pub async fn save_or_update_movie<C: ConnectionTrait>(
    conn: &C,
    movie: &Movie,
) -> Result<(), StoreError> {
    movies::Entity::insert(movies::ActiveModel {
        id: Set(movie.id),
        title: Set(movie.title.clone()),
        overview: Set(movie.overview.clone()),
        duration: Set(movie.duration),
        poster_path: Set(movie.poster_path.clone()),
        official_trailer: Set(movie.official_trailer.clone()),
        original_language: Set(movie.original_language.clone()),
        release_date: Set(movie.release_date.map(|d| d.to_string())),
        status: Set(movie.status.clone()),
        updated_at: Set(movie.updated_at),
    })
    .on_conflict(
        OnConflict::column(movies::Column::Id)
            .update_columns([
                movies::Column::Title,
                movies::Column::Overview,
                movies::Column::Duration,
                movies::Column::PosterPath,
                movies::Column::OfficialTrailer,
                movies::Column::OriginalLanguage,
                movies::Column::ReleaseDate,
                movies::Column::Status,
                movies::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec(conn)
    .await?;

    for genre in &movie.genres {
        genres::Entity::insert(genres::ActiveModel {
            id: Set(genre.id),
            name: Set(genre.name.clone()),
        })
        .on_conflict(
            OnConflict::column(genres::Column::Id)
                .update_columns([genres::Column::Name])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    }

    includes::Entity::delete_many()
        .filter(includes::Column::MovieId.eq(movie.id))
        .exec(conn)
        .await?;
    for genre in &movie.genres {
        includes::Entity::insert(includes::ActiveModel {
            genre_id: Set(genre.id),
            movie_id: Set(movie.id),
        })
        .exec(conn)
        .await?;
    }
    Ok(())
}

pub async fn get_one_movie_by_id<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
) -> Result<Movie, StoreError> {
    let row = movies::Entity::find_by_id(movie_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("movie"))?;
    let mut genres = load_genres(conn, &[movie_id]).await?;
    Ok(movie_from_row(row, genres.remove(&movie_id).unwrap_or_default()))
}

/// Every movie any member of the watchlist has a YEAH vote on, title
/// ascending, each with its genres in name order.
pub async fn get_all_movies_for_watchlist<C: ConnectionTrait>(
    conn: &C,
    watchlist_id: &Uuid,
) -> Result<Vec<Movie>, StoreError> {
    let member_ids: Vec<String> = crate::entities::members::Entity::find()
        .filter(crate::entities::members::Column::WatchlistId.eq(watchlist_id.to_string()))
        .select_only()
        .column(crate::entities::members::Column::UserId)
        .into_tuple()
        .all(conn)
        .await?;

    let movie_ids: Vec<i32> = votes::Entity::find()
        .filter(votes::Column::UserId.is_in(member_ids.iter().map(String::as_str)))
        .filter(votes::Column::Vote.eq(VoteValue::Yeah.as_str()))
        .select_only()
        .column(votes::Column::MovieId)
        .distinct()
        .into_tuple()
        .all(conn)
        .await?;

    let rows = movies::Entity::find()
        .filter(movies::Column::Id.is_in(movie_ids.iter().copied()))
        .order_by_asc(movies::Column::Title)
        .all(conn)
        .await?;

    let mut genre_map = load_genres(conn, &movie_ids).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let genres = genre_map.remove(&row.id).unwrap_or_default();
            movie_from_row(row, genres)
        })
        .collect())
}

/// Filters `candidate_ids` down to the ids whose cached details need a
/// refresh. Unknown ids and detail-less stubs are always returned.
pub async fn keep_movie_ids_where_update_is_needed<C: ConnectionTrait>(
    conn: &C,
    candidate_ids: &[i32],
    now: Timestamp,
) -> Result<Vec<i32>, StoreError> {
    let rows: Vec<(i32, Option<String>, Option<i64>)> = movies::Entity::find()
        .filter(movies::Column::Id.is_in(candidate_ids.iter().copied()))
        .select_only()
        .columns([
            movies::Column::Id,
            movies::Column::ReleaseDate,
            movies::Column::UpdatedAt,
        ])
        .into_tuple()
        .all(conn)
        .await?;
    let known: HashMap<i32, (Option<String>, Option<i64>)> =
        rows.into_iter().map(|(id, release, updated)| (id, (release, updated))).collect();

    Ok(candidate_ids
        .iter()
        .copied()
        .filter(|id| match known.get(id) {
            Some((release, updated)) => !is_fresh(release.as_deref(), *updated, now),
            None => true,
        })
        .collect())
}

/// Whether a cached movie's details are still considered current. Missing or
/// unparseable release data always reads as stale.
fn is_fresh(release_date: Option<&str>, updated_at: Option<i64>, now: Timestamp) -> bool {
    let (Some(raw), Some(updated_at)) = (release_date, updated_at) else {
        return false;
    };
    let Ok(release) = raw.parse::<Date>() else {
        return false;
    };
    let today = now.to_zoned(TimeZone::UTC).date();
    let Ok(span) = release.until(today) else {
        return false;
    };
    let cache_age = now.as_second() - updated_at;
    if span.get_days() > RECENT_RELEASE_DAYS {
        cache_age < FOUR_WEEKS_SECS
    } else {
        cache_age < ONE_DAY_SECS
    }
}

/// Two-phase retention sweep. Movies nobody voted on or watched and whose
/// details are older than four weeks are deleted outright, edges included.
/// Movies with watch history but no votes are reduced to bare-id stubs.
/// Returns (deleted, stripped) row counts.
pub async fn delete_details_of_obsolete_movies<C: ConnectionTrait>(
    conn: &C,
    now: Timestamp,
) -> Result<(u64, u64), StoreError> {
    let cutoff = now.as_second() - FOUR_WEEKS_SECS;

    let voted: Vec<i32> = votes::Entity::find()
        .select_only()
        .column(votes::Column::MovieId)
        .distinct()
        .into_tuple()
        .all(conn)
        .await?;
    let watched: Vec<i32> = watch_history::Entity::find()
        .select_only()
        .column(watch_history::Column::MovieId)
        .distinct()
        .into_tuple()
        .all(conn)
        .await?;
    let mut retained = voted.clone();
    retained.extend(watched);

    let doomed: Vec<i32> = movies::Entity::find()
        .filter(movies::Column::UpdatedAt.lt(cutoff))
        .filter(movies::Column::Id.is_not_in(retained.iter().copied()))
        .select_only()
        .column(movies::Column::Id)
        .into_tuple()
        .all(conn)
        .await?;

    includes::Entity::delete_many()
        .filter(includes::Column::MovieId.is_in(doomed.iter().copied()))
        .exec(conn)
        .await?;
    crate::entities::carries::Entity::delete_many()
        .filter(crate::entities::carries::Column::MovieId.is_in(doomed.iter().copied()))
        .exec(conn)
        .await?;
    let deleted = movies::Entity::delete_many()
        .filter(movies::Column::Id.is_in(doomed.iter().copied()))
        .exec(conn)
        .await?
        .rows_affected;

    let stripped = movies::Entity::update_many()
        .col_expr(movies::Column::Title, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::Overview, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::Duration, Expr::value(Option::<i32>::None))
        .col_expr(movies::Column::PosterPath, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::OfficialTrailer, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::OriginalLanguage, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::ReleaseDate, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::Status, Expr::value(Option::<String>::None))
        .col_expr(movies::Column::UpdatedAt, Expr::value(Option::<i64>::None))
        .filter(movies::Column::UpdatedAt.lt(cutoff))
        .filter(movies::Column::Id.is_not_in(voted.iter().copied()))
        .exec(conn)
        .await?
        .rows_affected;

    Ok((deleted, stripped))
}

async fn load_genres<C: ConnectionTrait>(
    conn: &C,
    movie_ids: &[i32],
) -> Result<HashMap<i32, Vec<Genre>>, StoreError> {
    let edges: Vec<(i32, i32)> = includes::Entity::find()
        .filter(includes::Column::MovieId.is_in(movie_ids.iter().copied()))
        .select_only()
        .columns([includes::Column::GenreId, includes::Column::MovieId])
        .into_tuple()
        .all(conn)
        .await?;
    let genre_rows = genres::Entity::find()
        .filter(genres::Column::Id.is_in(edges.iter().map(|(genre_id, _)| *genre_id)))
        .all(conn)
        .await?;
    let by_id: HashMap<i32, Genre> = genre_rows
        .into_iter()
        .map(|row| (row.id, Genre { id: row.id, name: row.name }))
        .collect();

    let mut map: HashMap<i32, Vec<Genre>> = HashMap::new();
    for (genre_id, movie_id) in edges {
        if let Some(genre) = by_id.get(&genre_id) {
            map.entry(movie_id).or_default().push(genre.clone());
        }
    }
    for genres in map.values_mut() {
        genres.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(map)
}

fn movie_from_row(row: movies::Model, genres: Vec<Genre>) -> Movie {
    Movie {
        id: row.id,
        title: row.title,
        overview: row.overview,
        duration: row.duration,
        poster_path: row.poster_path,
        genres,
        official_trailer: row.official_trailer,
        original_language: row.original_language,
        release_date: row.release_date.and_then(|raw| raw.parse().ok()),
        status: row.status,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{
        models::VoteValue,
        store::{
            test_support::{test_db, test_movie, test_user},
            users, votes as vote_store,
        },
    };

    #[tokio::test]
    async fn saving_twice_keeps_genre_edges_single() {
        let db = test_db().await;
        let mut movie = test_movie(1, "Alien");
        movie.genres = vec![
            Genre { id: 27, name: "Horror".into() },
            Genre { id: 878, name: "Science Fiction".into() },
        ];

        save_or_update_movie(&db, &movie).await.unwrap();
        save_or_update_movie(&db, &movie).await.unwrap();

        let edge_count = includes::Entity::find()
            .filter(includes::Column::MovieId.eq(1))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(edge_count, 2);

        let loaded = get_one_movie_by_id(&db, 1).await.unwrap();
        assert_eq!(
            loaded.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["Horror", "Science Fiction"]
        );

        // an empty genre list clears the edges entirely
        movie.genres.clear();
        save_or_update_movie(&db, &movie).await.unwrap();
        let edge_count = includes::Entity::find()
            .filter(includes::Column::MovieId.eq(1))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(edge_count, 0);
    }

    #[tokio::test]
    async fn missing_movie_is_not_found() {
        let db = test_db().await;
        assert!(matches!(
            get_one_movie_by_id(&db, 404).await,
            Err(StoreError::NotFound("movie"))
        ));
    }

    #[test]
    fn settled_release_with_recent_update_is_fresh() {
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let updated = now.as_second() - 20 * 86_400;
        assert!(is_fresh(Some("2020-01-01"), Some(updated), now));
    }

    #[test]
    fn settled_release_with_old_update_is_stale() {
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let updated = now.as_second() - 29 * 86_400;
        assert!(!is_fresh(Some("2020-01-01"), Some(updated), now));
    }

    #[test]
    fn recent_release_needs_daily_refresh() {
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let two_days_old = now.as_second() - 2 * 86_400;
        let hours_old = now.as_second() - 3_600;
        assert!(!is_fresh(Some("2024-05-20"), Some(two_days_old), now));
        assert!(is_fresh(Some("2024-05-20"), Some(hours_old), now));
    }

    #[test]
    fn missing_or_bad_fields_read_as_stale() {
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        assert!(!is_fresh(None, Some(now.as_second()), now));
        assert!(!is_fresh(Some("2020-01-01"), None, now));
        assert!(!is_fresh(Some("not-a-date"), Some(now.as_second()), now));
    }

    #[tokio::test]
    async fn unknown_ids_always_need_update() {
        let db = test_db().await;
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let mut movie = test_movie(1, "Fresh");
        movie.release_date = Some(jiff::civil::date(2020, 1, 1));
        movie.updated_at = Some(now.as_second() - 3_600);
        save_or_update_movie(&db, &movie).await.unwrap();

        let stale = keep_movie_ids_where_update_is_needed(&db, &[1, 2], now).await.unwrap();
        assert_eq!(stale, vec![2]);
    }

    #[tokio::test]
    async fn sweep_deletes_unreferenced_and_strips_watched_movies() {
        let db = test_db().await;
        let now: Timestamp = "2024-06-01T00:00:00Z".parse().unwrap();
        let old = now.as_second() - 40 * 86_400;

        users::save_or_update_user(&db, &test_user("u1")).await.unwrap();

        let mut unreferenced = test_movie(1, "Forgotten");
        unreferenced.updated_at = Some(old);
        unreferenced.genres = vec![Genre { id: 18, name: "Drama".into() }];
        save_or_update_movie(&db, &unreferenced).await.unwrap();

        let mut voted = test_movie(2, "Loved");
        voted.updated_at = Some(old);
        save_or_update_movie(&db, &voted).await.unwrap();
        vote_store::vote_for_movie(&db, "u1", 2, VoteValue::Yeah).await.unwrap();

        let mut watched = test_movie(3, "Seen");
        watched.updated_at = Some(old);
        save_or_update_movie(&db, &watched).await.unwrap();
        vote_store::mark_movie_as_watched(&db, "u1", 3).await.unwrap();

        let (deleted, stripped) = delete_details_of_obsolete_movies(&db, now).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(stripped, 1);

        assert!(movies::Entity::find_by_id(1).one(&db).await.unwrap().is_none());
        let edge_count = includes::Entity::find()
            .filter(includes::Column::MovieId.eq(1))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(edge_count, 0);

        let kept = get_one_movie_by_id(&db, 2).await.unwrap();
        assert_eq!(kept.title.as_deref(), Some("Loved"));

        let stub = get_one_movie_by_id(&db, 3).await.unwrap();
        assert!(stub.title.is_none());
        assert!(stub.updated_at.is_none());
    }
}
