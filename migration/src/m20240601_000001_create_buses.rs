use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bus::Table)
                    .if_not_exists()
                    .col(string_len(Bus::Id, 64).primary_key())
                    .col(string_len(Bus::DepartureLocation, 100).not_null())
                    .col(string_len(Bus::ArrivalLocation, 100).not_null())
                    .col(integer(Bus::TotalSeats).not_null())
                    .check(Expr::col(Bus::TotalSeats).gt(0))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bus::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bus {
    Table,
    Id,
    DepartureLocation,
    ArrivalLocation,
    TotalSeats,
}
