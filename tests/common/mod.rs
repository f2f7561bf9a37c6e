#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use bus_reservation::{
    services::{
        catalog::{self, BusSeed},
        AllocationEngine, AllocationPolicy, DbScheduleCatalog, SeatRequest,
    },
    utils::clock::FixedClock,
    AppState, Config,
};

pub const JWT_SECRET: &str = "test-secret";

/// "Today" for every test: two days before the reference trip date.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 30).unwrap()
}

pub fn trip_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        reservation_quota: 2,
        booking_horizon_days: 7,
        request_timeout_ms: 5000,
        commit_max_attempts: 3,
        max_in_flight_requests: 64,
        catalog_seed_path: None,
    }
}

/// Fresh in-memory database with the schema applied. A single pooled
/// connection keeps every query on the same in-memory database.
pub async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    migrate(&db).await;
    db
}

/// Pool on a database file that other pools may share, as separate service
/// instances would.
pub async fn connect_file(path: &Path, max_connections: u32) -> DatabaseConnection {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .sqlx_logging(false);

    Database::connect(options).await.unwrap()
}

pub async fn migrate(db: &DatabaseConnection) {
    migration::Migrator::up(db, None).await.unwrap();
}

pub fn fixed_clock() -> FixedClock {
    FixedClock(Utc.from_utc_datetime(&today().and_hms_opt(6, 0, 0).unwrap()))
}

pub fn engine(db: DatabaseConnection, policy: AllocationPolicy) -> Arc<AllocationEngine<DbScheduleCatalog>> {
    Arc::new(AllocationEngine::new(
        db.clone(),
        DbScheduleCatalog::new(db),
        Arc::new(fixed_clock()),
        policy,
    ))
}

pub async fn seed_buses(db: &DatabaseConnection) {
    catalog::insert_bus(db, &bus("B1", 10, &["13:30", "08:00"])).await.unwrap();
    catalog::insert_bus(db, &bus("B2", 40, &["09:00"])).await.unwrap();
}

pub fn bus(id: &str, total_seats: i32, times: &[&str]) -> BusSeed {
    BusSeed {
        id: id.to_string(),
        departure_location: "Seosan".to_string(),
        arrival_location: "Hanseo University".to_string(),
        total_seats,
        departure_times: times.iter().map(|t| t.to_string()).collect(),
    }
}

/// Database with B1 (10 seats, 08:00 and 13:30) and B2 (40 seats, 09:00).
pub async fn setup() -> AppState {
    let db = connect().await;
    seed_buses(&db).await;

    AppState::with_clock(db, test_config(), Arc::new(fixed_clock()))
}

pub fn seat(user: &str, bus_id: &str, time: &str, seat_number: i32) -> SeatRequest {
    SeatRequest {
        user_id: user.to_string(),
        bus_id: bus_id.to_string(),
        date: trip_date(),
        time: time.to_string(),
        seat_number,
    }
}
