use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use crate::handlers::{admin, buses, health, reservations, trips};
use crate::middleware::auth::{auth_middleware, require_admin};
use crate::middleware::user_rate_limit::create_user_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public catalog and seat availability
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/buses", get(buses::list_buses))
        .route("/buses/{bus_id}", get(buses::get_bus))
        .route("/trips/{bus_id}/{date}/{time}/seats", get(trips::trip_seats));

    // Reservation routes (requires auth, rate limited per user)
    let reservation_routes = Router::new()
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/{id}", delete(reservations::cancel_reservation))
        .layer(create_user_governor())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (requires auth + admin role)
    let admin_routes = Router::new()
        .route("/reservations", get(admin::list_all_reservations))
        .route(
            "/trips/{bus_id}/{date}/{time}/reservations",
            get(admin::trip_manifest),
        )
        .route("/reservations/{id}", delete(reservations::cancel_reservation))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(reservation_routes)
        .nest("/admin", admin_routes)
        .with_state(state)
}
