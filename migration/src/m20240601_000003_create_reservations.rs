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
                    .table(Reservation::Table)
                    .if_not_exists()
                    .col(uuid(Reservation::Id).primary_key())
                    .col(string_len(Reservation::UserId, 128).not_null())
                    .col(string_len(Reservation::BusId, 64).not_null())
                    .col(integer(Reservation::SeatNumber).not_null())
                    .col(date(Reservation::TripDate).not_null())
                    .col(string_len(Reservation::DepartureTime, 5).not_null())
                    .col(string_len(Reservation::DepartureLocation, 100).not_null())
                    .col(string_len(Reservation::ArrivalLocation, 100).not_null())
                    .col(timestamp_with_time_zone(Reservation::CreatedAt).not_null())
                    // Buses with live reservations cannot be removed from the catalog
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_bus")
                            .from(Reservation::Table, Reservation::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // One live reservation per seat of a trip
        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_trip_seat")
                    .table(Reservation::Table)
                    .col(Reservation::BusId)
                    .col(Reservation::TripDate)
                    .col(Reservation::DepartureTime)
                    .col(Reservation::SeatNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_user")
                    .table(Reservation::Table)
                    .col(Reservation::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservation::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Reservation {
    Table,
    Id,
    UserId,
    BusId,
    SeatNumber,
    TripDate,
    DepartureTime,
    DepartureLocation,
    ArrivalLocation,
    CreatedAt,
}
