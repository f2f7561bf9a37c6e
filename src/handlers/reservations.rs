use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::handlers::{AppJson, AppPath, AppQuery};
use crate::services::{views, Reservation, SeatRequest};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Reserve a seat
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<SeatRequest>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    if !claims.may_act_for(&payload.user_id) {
        return Err(AppError::Forbidden(
            "You can only reserve seats for yourself".to_string(),
        ));
    }

    let reservation = state.engine.reserve(payload).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReservationQuery {
    pub user_id: Option<String>,
}

/// List a user's reservations (the caller's unless an admin names another user)
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<ReservationQuery>,
) -> AppResult<Json<Vec<Reservation>>> {
    let user_id = query.user_id.unwrap_or_else(|| claims.sub.clone());

    if !claims.may_act_for(&user_id) {
        return Err(AppError::Forbidden(
            "You can only view your own reservations".to_string(),
        ));
    }

    let reservations = views::reservations_by_user(&state.db, &user_id).await?;
    Ok(Json(reservations))
}

/// Cancel a reservation and release its seat
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(reservation_id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state
        .engine
        .cancel(reservation_id, &claims.requester())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
