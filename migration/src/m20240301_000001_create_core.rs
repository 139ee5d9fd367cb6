use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(string(Users::Id).primary_key())
                    .col(string(Users::Email))
                    .col(string(Users::Locale))
                    .col(string(Users::Nickname))
                    .col(string(Users::ProfilePic))
                    .col(big_integer(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TmdbUsers::Table)
                    .if_not_exists()
                    .col(big_integer(TmdbUsers::Id).primary_key())
                    .col(string(TmdbUsers::UserId))
                    .col(string(TmdbUsers::Session))
                    .col(boolean(TmdbUsers::IncludeAdult))
                    .col(string(TmdbUsers::Iso31661))
                    .col(string(TmdbUsers::Iso6391))
                    .col(string(TmdbUsers::Username))
                    .col(string(TmdbUsers::Name))
                    .col(big_integer(TmdbUsers::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tmdb_users_user")
                    .table(TmdbUsers::Table)
                    .col(TmdbUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(integer(Movies::Id).primary_key())
                    .col(string_null(Movies::Title))
                    .col(string_null(Movies::Overview))
                    .col(integer_null(Movies::Duration))
                    .col(string_null(Movies::PosterPath))
                    .col(string_null(Movies::OfficialTrailer))
                    .col(string_null(Movies::OriginalLanguage))
                    .col(string_null(Movies::ReleaseDate))
                    .col(string_null(Movies::Status))
                    .col(big_integer_null(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(integer(Genres::Id).primary_key())
                    .col(string(Genres::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Includes::Table)
                    .if_not_exists()
                    .col(integer(Includes::GenreId))
                    .col(integer(Includes::MovieId))
                    .primary_key(
                        Index::create()
                            .col(Includes::GenreId)
                            .col(Includes::MovieId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Votes::Table)
                    .if_not_exists()
                    .col(string(Votes::UserId))
                    .col(integer(Votes::MovieId))
                    .col(string(Votes::Vote))
                    .col(big_integer(Votes::UpdatedAt))
                    .primary_key(Index::create().col(Votes::UserId).col(Votes::MovieId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WatchHistory::Table)
                    .if_not_exists()
                    .col(string(WatchHistory::UserId))
                    .col(integer(WatchHistory::MovieId))
                    .col(big_integer(WatchHistory::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(WatchHistory::UserId)
                            .col(WatchHistory::MovieId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(WatchHistory::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Votes::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Includes::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(TmdbUsers::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Locale,
    Nickname,
    ProfilePic,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TmdbUsers {
    Table,
    Id,
    UserId,
    Session,
    IncludeAdult,
    #[sea_orm(iden = "iso_3166_1")]
    Iso31661,
    #[sea_orm(iden = "iso_639_1")]
    Iso6391,
    Username,
    Name,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Overview,
    Duration,
    PosterPath,
    OfficialTrailer,
    OriginalLanguage,
    ReleaseDate,
    Status,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Includes {
    Table,
    GenreId,
    MovieId,
}

#[derive(DeriveIden)]
enum Votes {
    Table,
    UserId,
    MovieId,
    Vote,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WatchHistory {
    Table,
    UserId,
    MovieId,
    UpdatedAt,
}
