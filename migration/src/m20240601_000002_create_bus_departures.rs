use sea_orm_migration::{prelude::*, schema::*};

use super::m20240601_000001_create_buses::Bus;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BusDeparture::Table)
                    .if_not_exists()
                    .col(pk_auto(BusDeparture::Id))
                    .col(string_len(BusDeparture::BusId, 64).not_null())
                    .col(string_len(BusDeparture::DepartureTime, 5).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bus_departure_bus")
                            .from(BusDeparture::Table, BusDeparture::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bus_departure_unique")
                    .table(BusDeparture::Table)
                    .col(BusDeparture::BusId)
                    .col(BusDeparture::DepartureTime)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BusDeparture::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BusDeparture {
    Table,
    Id,
    BusId,
    DepartureTime,
}
