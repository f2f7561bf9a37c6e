//! Read access to the schedule catalog.
//!
//! The catalog (buses, their routes and timetables) is owned by another
//! system. The reservation core only reads it; the seeding helpers below load
//! fixture data into an empty catalog and are not a management API.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entities::{bus, bus_departure};
use crate::error::{AppError, AppResult};
use crate::services::normalize_departure_time;

/// A bus as the allocation engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusSchedule {
    pub bus_id: String,
    pub departure_location: String,
    pub arrival_location: String,
    pub total_seats: i32,
    /// Zero-padded `HH:MM`, earliest first
    pub departure_times: Vec<String>,
}

impl BusSchedule {
    fn from_parts(bus: bus::Model, mut departure_times: Vec<String>) -> Self {
        departure_times.sort();
        departure_times.dedup();

        Self {
            bus_id: bus.id,
            departure_location: bus.departure_location,
            arrival_location: bus.arrival_location,
            total_seats: bus.total_seats,
            departure_times,
        }
    }

    pub fn departs_at(&self, time: &str) -> bool {
        self.departure_times.iter().any(|t| t == time)
    }
}

#[async_trait]
pub trait ScheduleCatalog: Send + Sync {
    async fn get_bus(&self, bus_id: &str) -> Result<Option<BusSchedule>, DbErr>;

    async fn list_buses(&self) -> Result<Vec<BusSchedule>, DbErr>;
}

/// Catalog backed by the `bus` and `bus_departure` tables.
#[derive(Clone)]
pub struct DbScheduleCatalog {
    db: DatabaseConnection,
}

impl DbScheduleCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScheduleCatalog for DbScheduleCatalog {
    async fn get_bus(&self, bus_id: &str) -> Result<Option<BusSchedule>, DbErr> {
        let Some(bus) = bus::Entity::find_by_id(bus_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let times = bus_departure::Entity::find()
            .filter(bus_departure::Column::BusId.eq(bus_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|d| d.departure_time)
            .collect();

        Ok(Some(BusSchedule::from_parts(bus, times)))
    }

    async fn list_buses(&self) -> Result<Vec<BusSchedule>, DbErr> {
        let buses = bus::Entity::find()
            .order_by_asc(bus::Column::DepartureLocation)
            .order_by_asc(bus::Column::ArrivalLocation)
            .order_by_asc(bus::Column::Id)
            .all(&self.db)
            .await?;

        let mut times: HashMap<String, Vec<String>> = HashMap::new();
        for departure in bus_departure::Entity::find().all(&self.db).await? {
            times
                .entry(departure.bus_id)
                .or_default()
                .push(departure.departure_time);
        }

        Ok(buses
            .into_iter()
            .map(|b| {
                let bus_times = times.remove(&b.id).unwrap_or_default();
                BusSchedule::from_parts(b, bus_times)
            })
            .collect())
    }
}

// ============ Fixture loading ============

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BusSeed {
    pub id: String,
    pub departure_location: String,
    pub arrival_location: String,
    pub total_seats: i32,
    pub departure_times: Vec<String>,
}

/// Insert one bus and its timetable.
pub async fn insert_bus<C: ConnectionTrait>(conn: &C, seed: &BusSeed) -> AppResult<()> {
    if seed.id.trim().is_empty() {
        return Err(AppError::BadRequest("Bus id must not be empty".to_string()));
    }
    if seed.total_seats <= 0 {
        return Err(AppError::BadRequest(format!(
            "Bus {} must have at least one seat",
            seed.id
        )));
    }

    let mut times = Vec::with_capacity(seed.departure_times.len());
    for raw in &seed.departure_times {
        let time = normalize_departure_time(raw).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid departure time {:?} for bus {}", raw, seed.id))
        })?;
        times.push(time);
    }
    times.sort();
    times.dedup();

    bus::ActiveModel {
        id: Set(seed.id.clone()),
        departure_location: Set(seed.departure_location.clone()),
        arrival_location: Set(seed.arrival_location.clone()),
        total_seats: Set(seed.total_seats),
    }
    .insert(conn)
    .await?;

    for time in times {
        bus_departure::ActiveModel {
            bus_id: Set(seed.id.clone()),
            departure_time: Set(time),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    Ok(())
}

/// Load buses from a JSON array into an empty catalog. Returns how many buses
/// were inserted; a catalog that already has buses is left alone.
pub async fn seed_from_file(db: &DatabaseConnection, path: impl AsRef<Path>) -> AppResult<usize> {
    if bus::Entity::find().count(db).await? > 0 {
        return Ok(0);
    }

    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Internal(format!("Failed to read catalog seed {}: {}", path.display(), e))
    })?;
    let seeds: Vec<BusSeed> = serde_json::from_str(&raw).map_err(|e| {
        AppError::Internal(format!("Invalid catalog seed {}: {}", path.display(), e))
    })?;

    let txn = db.begin().await?;
    for seed in &seeds {
        insert_bus(&txn, seed).await?;
    }
    txn.commit().await?;

    Ok(seeds.len())
}
