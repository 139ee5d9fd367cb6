//! Graph store access layer.
//!
//! Free async functions generic over [`sea_orm::ConnectionTrait`] so each
//! operation runs on whatever the caller holds, usually an open transaction.
//! Writes are upserts keyed by natural id.

pub mod availability;
pub mod movies;
pub mod users;
pub mod votes;
pub mod watchlists;

fn now_epoch() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
pub(crate) mod test_support {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database, DatabaseConnection};

    pub async fn test_db() -> DatabaseConnection {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    pub fn test_user(id: &str) -> crate::models::User {
        crate::models::User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            locale: "HU".to_string(),
            nickname: id.to_string(),
            profile_pic: format!("/avatars/{id}.png"),
            updated_at: 1_700_000_000,
        }
    }

    pub fn test_movie(id: i32, title: &str) -> crate::models::Movie {
        crate::models::Movie {
            id,
            title: Some(title.to_string()),
            overview: Some("overview".to_string()),
            duration: Some(120),
            poster_path: Some(format!("/p/{id}.jpg")),
            genres: vec![],
            official_trailer: None,
            original_language: Some("en".to_string()),
            release_date: Some(jiff::civil::date(2020, 1, 1)),
            status: Some("Released".to_string()),
            updated_at: Some(1_700_000_000),
        }
    }
}
