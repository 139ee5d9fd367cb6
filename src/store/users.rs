use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::OnConflict,
};

use crate::{
    entities::{tmdb_users, users},
    error::StoreError,
    models::{TmdbAccount, User},
};

pub async fn save_or_update_user<C: ConnectionTrait>(
    conn: &C,
    user: &User,
) -> Result<(), StoreError> {
    users::Entity::insert(users::ActiveModel {
        id: Set(user.id.clone()),
        email: Set(user.email.clone()),
        locale: Set(user.locale.clone()),
        nickname: Set(user.nickname.clone()),
        profile_pic: Set(user.profile_pic.clone()),
        updated_at: Set(user.updated_at),
    })
    .on_conflict(
        OnConflict::column(users::Column::Id)
            .update_columns([
                users::Column::Email,
                users::Column::Locale,
                users::Column::Nickname,
                users::Column::ProfilePic,
                users::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec(conn)
    .await?;
    Ok(())
}

pub async fn get_one_user<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<User, StoreError> {
    let row = users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
    Ok(user_from_row(row))
}

/// Upserts the external catalog account linked to a user. The user row must
/// already exist.
pub async fn save_or_update_tmdb_account<C: ConnectionTrait>(
    conn: &C,
    account: &TmdbAccount,
) -> Result<(), StoreError> {
    users::Entity::find_by_id(&account.user_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("user"))?;

    tmdb_users::Entity::insert(tmdb_users::ActiveModel {
        id: Set(account.tmdb_id),
        user_id: Set(account.user_id.clone()),
        session: Set(account.session.clone()),
        include_adult: Set(account.include_adult),
        iso_3166_1: Set(account.iso_3166_1.clone()),
        iso_639_1: Set(account.iso_639_1.clone()),
        username: Set(account.username.clone()),
        name: Set(account.name.clone()),
        updated_at: Set(account.updated_at),
    })
    .on_conflict(
        OnConflict::column(tmdb_users::Column::Id)
            .update_columns([
                tmdb_users::Column::UserId,
                tmdb_users::Column::Session,
                tmdb_users::Column::IncludeAdult,
                tmdb_users::Column::Iso31661,
                tmdb_users::Column::Iso6391,
                tmdb_users::Column::Username,
                tmdb_users::Column::Name,
                tmdb_users::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec(conn)
    .await?;
    Ok(())
}

/// Absence of a link is a hard error here; callers that treat it as a
/// business condition map it themselves.
pub async fn get_tmdb_account<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<TmdbAccount, StoreError> {
    let row = tmdb_users::Entity::find()
        .filter(tmdb_users::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("tmdb account"))?;
    Ok(account_from_row(row))
}

pub async fn count_tmdb_accounts<C: ConnectionTrait>(conn: &C) -> Result<u64, StoreError> {
    Ok(tmdb_users::Entity::find().count(conn).await?)
}

/// One page of linked accounts in external-id order; the synchronizer walks
/// the full set page by page.
pub async fn get_tmdb_accounts_page<C: ConnectionTrait>(
    conn: &C,
    offset: u64,
    limit: u64,
) -> Result<Vec<TmdbAccount>, StoreError> {
    let rows = tmdb_users::Entity::find()
        .order_by_asc(tmdb_users::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(account_from_row).collect())
}

fn user_from_row(row: users::Model) -> User {
    User {
        id: row.id,
        email: row.email,
        locale: row.locale,
        nickname: row.nickname,
        profile_pic: row.profile_pic,
        updated_at: row.updated_at,
    }
}

fn account_from_row(row: tmdb_users::Model) -> TmdbAccount {
    TmdbAccount {
        user_id: row.user_id,
        tmdb_id: row.id,
        session: row.session,
        include_adult: row.include_adult,
        iso_3166_1: row.iso_3166_1,
        iso_639_1: row.iso_639_1,
        username: row.username,
        name: row.name,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{test_db, test_user};

    fn test_account(user_id: &str, tmdb_id: i64) -> TmdbAccount {
        TmdbAccount {
            user_id: user_id.to_string(),
            tmdb_id,
            session: "sess".to_string(),
            include_adult: false,
            iso_3166_1: "HU".to_string(),
            iso_639_1: "hu".to_string(),
            username: user_id.to_string(),
            name: user_id.to_string(),
            updated_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn saving_a_user_twice_overwrites_in_place() {
        let db = test_db().await;
        let mut user = test_user("u1");
        save_or_update_user(&db, &user).await.unwrap();
        user.nickname = "renamed".to_string();
        save_or_update_user(&db, &user).await.unwrap();

        let loaded = get_one_user(&db, "u1").await.unwrap();
        assert_eq!(loaded.nickname, "renamed");
        assert_eq!(count_tmdb_accounts(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn account_requires_existing_user() {
        let db = test_db().await;
        let err = save_or_update_tmdb_account(&db, &test_account("ghost", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user")));
    }

    #[tokio::test]
    async fn accounts_page_in_external_id_order() {
        let db = test_db().await;
        for (user, tmdb_id) in [("u1", 30), ("u2", 10), ("u3", 20)] {
            save_or_update_user(&db, &test_user(user)).await.unwrap();
            save_or_update_tmdb_account(&db, &test_account(user, tmdb_id)).await.unwrap();
        }

        assert_eq!(count_tmdb_accounts(&db).await.unwrap(), 3);
        let page = get_tmdb_accounts_page(&db, 0, 2).await.unwrap();
        assert_eq!(page.iter().map(|a| a.tmdb_id).collect::<Vec<_>>(), vec![10, 20]);
        let rest = get_tmdb_accounts_page(&db, 2, 2).await.unwrap();
        assert_eq!(rest.iter().map(|a| a.tmdb_id).collect::<Vec<_>>(), vec![30]);
    }

    #[tokio::test]
    async fn missing_link_is_not_found() {
        let db = test_db().await;
        save_or_update_user(&db, &test_user("u1")).await.unwrap();
        assert!(matches!(
            get_tmdb_account(&db, "u1").await,
            Err(StoreError::NotFound("tmdb account"))
        ));
    }
}
