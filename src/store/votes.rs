use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    sea_query::OnConflict,
};

use crate::{
    entities::{movies, users, votes, watch_history},
    error::StoreError,
    models::{Vote, VoteValue, WatchRecord},
};

use super::now_epoch;

/// Records or overwrites a user's vote on a movie, timestamp included. Both
/// endpoints must exist.
pub async fn vote_for_movie<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    movie_id: i32,
    vote: VoteValue,
) -> Result<(), StoreError> {
    require_pair(conn, user_id, movie_id).await?;

    votes::Entity::insert(votes::ActiveModel {
        user_id: Set(user_id.to_string()),
        movie_id: Set(movie_id),
        vote: Set(vote.as_str().to_string()),
        updated_at: Set(now_epoch()),
    })
    .on_conflict(
        OnConflict::columns([votes::Column::UserId, votes::Column::MovieId])
            .update_columns([votes::Column::Vote, votes::Column::UpdatedAt])
            .to_owned(),
    )
    .exec(conn)
    .await?;
    Ok(())
}

/// Adds a watch-history entry and removes any standing vote for the pair, so
/// a watched movie drops out of the group watchlist.
pub async fn mark_movie_as_watched<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    movie_id: i32,
) -> Result<(), StoreError> {
    require_pair(conn, user_id, movie_id).await?;

    watch_history::Entity::insert(watch_history::ActiveModel {
        user_id: Set(user_id.to_string()),
        movie_id: Set(movie_id),
        updated_at: Set(now_epoch()),
    })
    .on_conflict(
        OnConflict::columns([watch_history::Column::UserId, watch_history::Column::MovieId])
            .update_columns([watch_history::Column::UpdatedAt])
            .to_owned(),
    )
    .exec(conn)
    .await?;

    votes::Entity::delete_many()
        .filter(votes::Column::UserId.eq(user_id))
        .filter(votes::Column::MovieId.eq(movie_id))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn get_all_votes_of_watchlist<C: ConnectionTrait>(
    conn: &C,
    user_ids: &[String],
    movie_ids: &[i32],
) -> Result<Vec<Vote>, StoreError> {
    let rows = votes::Entity::find()
        .filter(votes::Column::UserId.is_in(user_ids.iter().map(String::as_str)))
        .filter(votes::Column::MovieId.is_in(movie_ids.iter().copied()))
        .all(conn)
        .await?;
    rows.into_iter()
        .map(|row| {
            let vote = VoteValue::from_str(&row.vote).ok_or_else(|| {
                StoreError::Constraint(format!("unknown vote value '{}'", row.vote))
            })?;
            Ok(Vote {
                user_id: row.user_id,
                movie_id: row.movie_id,
                vote,
                updated_at: row.updated_at,
            })
        })
        .collect()
}

pub async fn get_all_watch_history_of_watchlist<C: ConnectionTrait>(
    conn: &C,
    user_ids: &[String],
    movie_ids: &[i32],
) -> Result<Vec<WatchRecord>, StoreError> {
    let rows = watch_history::Entity::find()
        .filter(watch_history::Column::UserId.is_in(user_ids.iter().map(String::as_str)))
        .filter(watch_history::Column::MovieId.is_in(movie_ids.iter().copied()))
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| WatchRecord {
            user_id: row.user_id,
            movie_id: row.movie_id,
            updated_at: row.updated_at,
        })
        .collect())
}

async fn require_pair<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    movie_id: i32,
) -> Result<(), StoreError> {
    users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
    movies::Entity::find_by_id(movie_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("movie"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        movies as movie_store,
        test_support::{test_db, test_movie, test_user},
        users as user_store,
    };

    async fn seed(db: &sea_orm::DatabaseConnection) {
        user_store::save_or_update_user(db, &test_user("u1")).await.unwrap();
        movie_store::save_or_update_movie(db, &test_movie(1, "Alien")).await.unwrap();
    }

    #[tokio::test]
    async fn revoting_overwrites_the_previous_vote() {
        let db = test_db().await;
        seed(&db).await;

        vote_for_movie(&db, "u1", 1, VoteValue::Yeah).await.unwrap();
        vote_for_movie(&db, "u1", 1, VoteValue::Nah).await.unwrap();

        let all = get_all_votes_of_watchlist(&db, &["u1".to_string()], &[1]).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].vote, VoteValue::Nah);
    }

    #[tokio::test]
    async fn watching_removes_the_vote() {
        let db = test_db().await;
        seed(&db).await;

        vote_for_movie(&db, "u1", 1, VoteValue::Yeah).await.unwrap();
        mark_movie_as_watched(&db, "u1", 1).await.unwrap();

        let votes = get_all_votes_of_watchlist(&db, &["u1".to_string()], &[1]).await.unwrap();
        assert!(votes.is_empty());
        let history =
            get_all_watch_history_of_watchlist(&db, &["u1".to_string()], &[1]).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn voting_on_a_missing_movie_fails() {
        let db = test_db().await;
        user_store::save_or_update_user(&db, &test_user("u1")).await.unwrap();
        let err = vote_for_movie(&db, "u1", 99, VoteValue::Yeah).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("movie")));
    }
}
