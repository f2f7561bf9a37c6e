use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::handlers::{trips::parse_trip_date, AppPath};
use crate::services::{views, Reservation};
use crate::AppState;

/// List all reservations (admin)
pub async fn list_all_reservations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = views::reservations_all(&state.db).await?;
    Ok(Json(reservations))
}

/// Passenger manifest for one trip (admin)
pub async fn trip_manifest(
    State(state): State<AppState>,
    AppPath((bus_id, date, time)): AppPath<(String, String, String)>,
) -> AppResult<Json<Vec<Reservation>>> {
    let date = parse_trip_date(&date)?;

    let reservations = state.engine.trip_reservations(&bus_id, date, &time).await?;
    Ok(Json(reservations))
}
