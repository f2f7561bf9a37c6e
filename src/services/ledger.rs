//! Data access for the reservation ledger.
//!
//! The seat map is not stored separately: the occupied seats of a trip are
//! exactly the seat numbers of its live reservations, so a ledger row and its
//! seat are written and deleted together.

use std::collections::BTreeSet;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use crate::entities::reservation;
use crate::services::{Reservation, TripKey};

fn for_trip(trip: &TripKey) -> Select<reservation::Entity> {
    reservation::Entity::find()
        .filter(reservation::Column::BusId.eq(trip.bus_id.as_str()))
        .filter(reservation::Column::TripDate.eq(trip.date))
        .filter(reservation::Column::DepartureTime.eq(trip.time.as_str()))
}

/// Seat numbers currently taken on a trip.
pub async fn occupied_seats<C: ConnectionTrait>(conn: &C, trip: &TripKey) -> Result<BTreeSet<i32>, DbErr> {
    let seats: Vec<i32> = for_trip(trip)
        .select_only()
        .column(reservation::Column::SeatNumber)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(seats.into_iter().collect())
}

/// Passenger manifest of a trip, by seat number.
pub async fn reservations_for_trip<C: ConnectionTrait>(
    conn: &C,
    trip: &TripKey,
) -> Result<Vec<Reservation>, DbErr> {
    for_trip(trip)
        .order_by_asc(reservation::Column::SeatNumber)
        .all(conn)
        .await
}

/// Live reservations held by a user across all trips.
pub async fn live_count_for_user<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<u64, DbErr> {
    reservation::Entity::find()
        .filter(reservation::Column::UserId.eq(user_id))
        .count(conn)
        .await
}

pub async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Reservation>, DbErr> {
    reservation::Entity::find_by_id(id).one(conn).await
}
