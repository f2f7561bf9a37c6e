//! Read projections over the ledger. Nothing here may feed a reserve or
//! cancel decision; those re-read under the engine's locks.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::reservation;
use crate::services::Reservation;

/// A user's reservations, oldest first.
pub async fn reservations_by_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<Vec<Reservation>, DbErr> {
    reservation::Entity::find()
        .filter(reservation::Column::UserId.eq(user_id))
        .order_by_asc(reservation::Column::CreatedAt)
        .order_by_asc(reservation::Column::Id)
        .all(conn)
        .await
}

/// Every live reservation, for administrative listing.
pub async fn reservations_all<C: ConnectionTrait>(conn: &C) -> Result<Vec<Reservation>, DbErr> {
    reservation::Entity::find()
        .order_by_asc(reservation::Column::TripDate)
        .order_by_asc(reservation::Column::DepartureTime)
        .order_by_asc(reservation::Column::BusId)
        .order_by_asc(reservation::Column::SeatNumber)
        .all(conn)
        .await
}
