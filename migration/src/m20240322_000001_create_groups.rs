use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Watchlists::Table)
                    .if_not_exists()
                    .col(string(Watchlists::Id).primary_key())
                    .col(string(Watchlists::Name))
                    .col(big_integer(Watchlists::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Members::Table)
                    .if_not_exists()
                    .col(string(Members::WatchlistId))
                    .col(string(Members::UserId))
                    .col(boolean(Members::IsPrimary))
                    .col(big_integer(Members::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(Members::WatchlistId)
                            .col(Members::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_members_user")
                    .table(Members::Table)
                    .col(Members::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(integer(Providers::Id).primary_key())
                    .col(string(Providers::Name))
                    .col(string(Providers::LogoPath))
                    .col(big_integer(Providers::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Follows::Table)
                    .if_not_exists()
                    .col(string(Follows::WatchlistId))
                    .col(integer(Follows::ProviderId))
                    .col(string(Follows::Location))
                    .col(integer(Follows::Priority))
                    .col(big_integer(Follows::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(Follows::WatchlistId)
                            .col(Follows::ProviderId)
                            .col(Follows::Location),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Carries::Table)
                    .if_not_exists()
                    .col(integer(Carries::ProviderId))
                    .col(integer(Carries::MovieId))
                    .col(string(Carries::Location))
                    .col(string(Carries::WatchType))
                    .col(big_integer(Carries::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(Carries::ProviderId)
                            .col(Carries::MovieId)
                            .col(Carries::Location)
                            .col(Carries::WatchType),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_carries_movie")
                    .table(Carries::Table)
                    .col(Carries::MovieId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Carries::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Follows::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Providers::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Members::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Watchlists::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Watchlists {
    Table,
    Id,
    Name,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Members {
    Table,
    WatchlistId,
    UserId,
    IsPrimary,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
    Name,
    LogoPath,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Follows {
    Table,
    WatchlistId,
    ProviderId,
    Location,
    Priority,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Carries {
    Table,
    ProviderId,
    MovieId,
    Location,
    WatchType,
    UpdatedAt,
}
