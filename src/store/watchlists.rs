use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    entities::{follows, members, users, watchlists},
    error::StoreError,
    models::{ProviderFilter, User, Watchlist},
};

use super::now_epoch;

/// Upserts the watchlist row and replaces its provider filters wholesale.
/// Membership is managed separately through [`add_user_to_watchlist`].
pub async fn save_or_update_watchlist<C: ConnectionTrait>(
    conn: &C,
    watchlist: &Watchlist,
) -> Result<(), StoreError> {
    watchlists::Entity::insert(watchlists::ActiveModel {
        id: Set(watchlist.id.to_string()),
        name: Set(watchlist.name.clone()),
        updated_at: Set(watchlist.updated_at),
    })
    .on_conflict(
        OnConflict::column(watchlists::Column::Id)
            .update_columns([watchlists::Column::Name, watchlists::Column::UpdatedAt])
            .to_owned(),
    )
    .exec(conn)
    .await?;

    follows::Entity::delete_many()
        .filter(follows::Column::WatchlistId.eq(watchlist.id.to_string()))
        .exec(conn)
        .await?;
    for filter in &watchlist.provider_filters {
        follows::Entity::insert(follows::ActiveModel {
            watchlist_id: Set(watchlist.id.to_string()),
            provider_id: Set(filter.provider_id),
            location: Set(filter.location.clone()),
            priority: Set(filter.priority),
            updated_at: Set(filter.updated_at),
        })
        .exec(conn)
        .await?;
    }
    Ok(())
}

pub async fn get_watchlist_details<C: ConnectionTrait>(
    conn: &C,
    watchlist_id: &Uuid,
) -> Result<Watchlist, StoreError> {
    let row = watchlists::Entity::find_by_id(watchlist_id.to_string())
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("watchlist"))?;

    let member_ids: Vec<String> = members::Entity::find()
        .filter(members::Column::WatchlistId.eq(watchlist_id.to_string()))
        .select_only()
        .column(members::Column::UserId)
        .into_tuple()
        .all(conn)
        .await?;
    let users = users::Entity::find()
        .filter(users::Column::Id.is_in(member_ids.iter().map(String::as_str)))
        .order_by_asc(users::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|u| User {
            id: u.id,
            email: u.email,
            locale: u.locale,
            nickname: u.nickname,
            profile_pic: u.profile_pic,
            updated_at: u.updated_at,
        })
        .collect();

    let provider_filters = follows::Entity::find()
        .filter(follows::Column::WatchlistId.eq(watchlist_id.to_string()))
        .all(conn)
        .await?
        .into_iter()
        .map(filter_from_row)
        .collect();

    Ok(Watchlist {
        id: *watchlist_id,
        name: row.name,
        users,
        provider_filters,
        updated_at: row.updated_at,
    })
}

/// The watchlist a user's own view defaults to: their flagged primary
/// membership, falling back to their oldest membership.
pub async fn get_primary_watchlist_id<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<Uuid, StoreError> {
    let raw: Option<String> = members::Entity::find()
        .filter(members::Column::UserId.eq(user_id))
        .order_by_desc(members::Column::IsPrimary)
        .order_by_asc(members::Column::UpdatedAt)
        .select_only()
        .column(members::Column::WatchlistId)
        .limit(1)
        .into_tuple()
        .one(conn)
        .await?;
    let raw = raw.ok_or(StoreError::NotFound("watchlist membership"))?;
    Uuid::parse_str(&raw)
        .map_err(|err| StoreError::Constraint(format!("malformed watchlist id '{raw}': {err}")))
}

/// Adds (or refreshes) a membership. Flagging it primary clears the user's
/// primary flag everywhere else, keeping at most one primary per user.
pub async fn add_user_to_watchlist<C: ConnectionTrait>(
    conn: &C,
    watchlist_id: &Uuid,
    user_id: &str,
    primary: bool,
) -> Result<(), StoreError> {
    watchlists::Entity::find_by_id(watchlist_id.to_string())
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("watchlist"))?;
    users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(StoreError::NotFound("user"))?;

    if primary {
        members::Entity::update_many()
            .col_expr(members::Column::IsPrimary, Expr::value(false))
            .filter(members::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
    }

    members::Entity::insert(members::ActiveModel {
        watchlist_id: Set(watchlist_id.to_string()),
        user_id: Set(user_id.to_string()),
        is_primary: Set(primary),
        updated_at: Set(now_epoch()),
    })
    .on_conflict(
        OnConflict::columns([members::Column::WatchlistId, members::Column::UserId])
            .update_columns([members::Column::IsPrimary, members::Column::UpdatedAt])
            .to_owned(),
    )
    .exec(conn)
    .await?;
    Ok(())
}

/// The union of provider filters across every watchlist; drives the global
/// availability refresh.
pub async fn get_all_provider_filters<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<ProviderFilter>, StoreError> {
    let rows = follows::Entity::find()
        .order_by_asc(follows::Column::ProviderId)
        .order_by_asc(follows::Column::Location)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(filter_from_row).collect())
}

fn filter_from_row(row: follows::Model) -> ProviderFilter {
    ProviderFilter {
        provider_id: row.provider_id,
        location: row.location,
        priority: row.priority,
        updated_at: row.updated_at,
    }
}
