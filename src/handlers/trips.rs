use axum::{extract::State, Json};
use chrono::NaiveDate;

use crate::error::{AppError, AppResult};
use crate::handlers::AppPath;
use crate::services::SeatAvailability;
use crate::AppState;

pub(crate) fn parse_trip_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid date {:?}, expected YYYY-MM-DD", date)))
}

/// Seats still free on one trip
pub async fn trip_seats(
    State(state): State<AppState>,
    AppPath((bus_id, date, time)): AppPath<(String, String, String)>,
) -> AppResult<Json<SeatAvailability>> {
    let date = parse_trip_date(&date)?;

    let availability = state.engine.available_seats(&bus_id, date, &time).await?;
    Ok(Json(availability))
}
