use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{AppError, AppResult};
use crate::services::{BusSchedule, ScheduleCatalog};
use crate::AppState;

/// List buses with their departure times, earliest first
pub async fn list_buses(State(state): State<AppState>) -> AppResult<Json<Vec<BusSchedule>>> {
    let buses = state.engine.catalog().list_buses().await?;
    Ok(Json(buses))
}

/// Get one bus
pub async fn get_bus(
    State(state): State<AppState>,
    Path(bus_id): Path<String>,
) -> AppResult<Json<BusSchedule>> {
    let bus = state
        .engine
        .catalog()
        .get_bus(&bus_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Bus not found".to_string()))?;

    Ok(Json(bus))
}
