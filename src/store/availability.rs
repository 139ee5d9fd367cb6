use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    sea_query::OnConflict,
};

use crate::{
    entities::{carries, providers},
    error::StoreError,
    models::{Availability, Provider, ProviderFilter, WatchType},
};

pub async fn save_or_update_provider<C: ConnectionTrait>(
    conn: &C,
    provider: &Provider,
) -> Result<(), StoreError> {
    providers::Entity::insert(providers::ActiveModel {
        id: Set(provider.id),
        name: Set(provider.name.clone()),
        logo_path: Set(provider.logo_path.clone()),
        updated_at: Set(provider.updated_at),
    })
    .on_conflict(
        OnConflict::column(providers::Column::Id)
            .update_columns([
                providers::Column::Name,
                providers::Column::LogoPath,
                providers::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec(conn)
    .await?;
    Ok(())
}

/// Replaces the availability edges of the given movies with the batch.
/// The delete scope is the id list, not the batch, so a movie that lost
/// every offer ends up with no edges. Providers are upserted first so the
/// edges always have their endpoint.
pub async fn save_movie_availabilities<C: ConnectionTrait>(
    conn: &C,
    movie_ids: &[i32],
    availabilities: &[Availability],
) -> Result<(), StoreError> {
    let mut seen_providers = HashSet::new();
    for availability in availabilities {
        if seen_providers.insert(availability.provider.id) {
            save_or_update_provider(conn, &availability.provider).await?;
        }
    }

    carries::Entity::delete_many()
        .filter(carries::Column::MovieId.is_in(movie_ids.iter().copied()))
        .exec(conn)
        .await?;

    for availability in availabilities {
        carries::Entity::insert(carries::ActiveModel {
            provider_id: Set(availability.provider.id),
            movie_id: Set(availability.movie_id),
            location: Set(availability.location.clone()),
            watch_type: Set(availability.watch_type.as_key().to_string()),
            updated_at: Set(availability.updated_at),
        })
        .exec(conn)
        .await?;
    }
    Ok(())
}

/// All availability edges for the given movies, ordered by movie id,
/// provider name, location and watch type. With `filters` given, only edges
/// whose exact (provider, location) pair appears in a filter survive.
pub async fn get_all_availabilities_for_movies<C: ConnectionTrait>(
    conn: &C,
    movie_ids: &[i32],
    filters: Option<&[ProviderFilter]>,
) -> Result<Vec<Availability>, StoreError> {
    let rows = carries::Entity::find()
        .filter(carries::Column::MovieId.is_in(movie_ids.iter().copied()))
        .all(conn)
        .await?;

    let wanted: Option<HashSet<(i32, &str)>> = filters.map(|filters| {
        filters.iter().map(|f| (f.provider_id, f.location.as_str())).collect()
    });
    let rows: Vec<carries::Model> = rows
        .into_iter()
        .filter(|row| match &wanted {
            Some(pairs) => pairs.contains(&(row.provider_id, row.location.as_str())),
            None => true,
        })
        .collect();

    let provider_rows = providers::Entity::find()
        .filter(providers::Column::Id.is_in(rows.iter().map(|r| r.provider_id)))
        .all(conn)
        .await?;
    let provider_map: HashMap<i32, Provider> = provider_rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                Provider {
                    id: row.id,
                    name: row.name,
                    logo_path: row.logo_path,
                    updated_at: row.updated_at,
                },
            )
        })
        .collect();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let provider = provider_map
            .get(&row.provider_id)
            .cloned()
            .ok_or(StoreError::NotFound("provider"))?;
        let watch_type = WatchType::from_key(&row.watch_type).ok_or_else(|| {
            StoreError::Constraint(format!("unknown watch type '{}'", row.watch_type))
        })?;
        out.push(Availability {
            provider,
            movie_id: row.movie_id,
            location: row.location,
            watch_type,
            updated_at: row.updated_at,
        });
    }
    out.sort_by(|a, b| {
        a.movie_id
            .cmp(&b.movie_id)
            .then_with(|| a.provider.name.cmp(&b.provider.name))
            .then_with(|| a.location.cmp(&b.location))
            .then_with(|| a.watch_type.as_key().cmp(b.watch_type.as_key()))
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{movies as movie_store, test_support::{test_db, test_movie}};

    fn provider(id: i32, name: &str) -> Provider {
        Provider {
            id,
            name: name.to_string(),
            logo_path: format!("/logos/{id}.png"),
            updated_at: 1_700_000_000,
        }
    }

    fn edge(provider: Provider, movie_id: i32, location: &str, watch_type: WatchType) -> Availability {
        Availability {
            provider,
            movie_id,
            location: location.to_string(),
            watch_type,
            updated_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn saving_replaces_all_edges_for_the_batch() {
        let db = test_db().await;
        movie_store::save_or_update_movie(&db, &test_movie(1, "Alien")).await.unwrap();

        save_movie_availabilities(
            &db,
            &[1],
            &[
                edge(provider(8, "Netflix"), 1, "HU", WatchType::Stream),
                edge(provider(337, "Disney Plus"), 1, "HU", WatchType::Stream),
            ],
        )
        .await
        .unwrap();
        save_movie_availabilities(
            &db,
            &[1],
            &[edge(provider(8, "Netflix"), 1, "HU", WatchType::Rent)],
        )
        .await
        .unwrap();

        let all = get_all_availabilities_for_movies(&db, &[1], None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].provider.id, 8);
        assert_eq!(all[0].watch_type, WatchType::Rent);

        // growing the set does not duplicate the surviving row
        save_movie_availabilities(
            &db,
            &[1],
            &[
                edge(provider(8, "Netflix"), 1, "HU", WatchType::Rent),
                edge(provider(119, "Amazon"), 1, "HU", WatchType::Buy),
            ],
        )
        .await
        .unwrap();
        let all = get_all_availabilities_for_movies(&db, &[1], None).await.unwrap();
        let pairs: Vec<(i32, WatchType)> =
            all.iter().map(|a| (a.provider.id, a.watch_type)).collect();
        assert_eq!(pairs, vec![(119, WatchType::Buy), (8, WatchType::Rent)]);
    }

    #[tokio::test]
    async fn saving_an_empty_set_removes_every_edge() {
        let db = test_db().await;
        movie_store::save_or_update_movie(&db, &test_movie(1, "Alien")).await.unwrap();
        save_movie_availabilities(
            &db,
            &[1],
            &[
                edge(provider(8, "Netflix"), 1, "HU", WatchType::Stream),
                edge(provider(337, "Disney Plus"), 1, "HU", WatchType::Stream),
            ],
        )
        .await
        .unwrap();

        save_movie_availabilities(&db, &[1], &[]).await.unwrap();

        let all = get_all_availabilities_for_movies(&db, &[1], None).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn filters_match_exact_provider_location_pairs() {
        let db = test_db().await;
        movie_store::save_or_update_movie(&db, &test_movie(1, "Alien")).await.unwrap();
        save_movie_availabilities(
            &db,
            &[1],
            &[
                edge(provider(8, "Netflix"), 1, "HU", WatchType::Stream),
                edge(provider(8, "Netflix"), 1, "DE", WatchType::Stream),
                edge(provider(337, "Disney Plus"), 1, "HU", WatchType::Buy),
            ],
        )
        .await
        .unwrap();

        let filters = vec![ProviderFilter {
            provider_id: 8,
            location: "HU".to_string(),
            priority: 0,
            updated_at: 0,
        }];
        let hits = get_all_availabilities_for_movies(&db, &[1], Some(&filters)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider.id, 8);
        assert_eq!(hits[0].location, "HU");
    }

    #[tokio::test]
    async fn results_are_deterministically_ordered() {
        let db = test_db().await;
        movie_store::save_or_update_movie(&db, &test_movie(1, "Alien")).await.unwrap();
        movie_store::save_or_update_movie(&db, &test_movie(2, "Brazil")).await.unwrap();
        save_movie_availabilities(
            &db,
            &[1, 2],
            &[
                edge(provider(337, "Disney Plus"), 2, "HU", WatchType::Stream),
                edge(provider(8, "Netflix"), 2, "HU", WatchType::Stream),
                edge(provider(8, "Netflix"), 1, "HU", WatchType::Buy),
            ],
        )
        .await
        .unwrap();

        let all = get_all_availabilities_for_movies(&db, &[1, 2], None).await.unwrap();
        let order: Vec<(i32, &str)> =
            all.iter().map(|a| (a.movie_id, a.provider.name.as_str())).collect();
        assert_eq!(order, vec![(1, "Netflix"), (2, "Disney Plus"), (2, "Netflix")]);
    }
}
