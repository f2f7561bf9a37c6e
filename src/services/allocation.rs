//! Allocation engine: atomic seat reservation and cancellation.
//!
//! Every check-and-commit runs while holding the caller's user lock and the
//! trip lock (always taken in that order), inside a single database
//! transaction. On PostgreSQL the transaction is `SERIALIZABLE`, so writers in
//! other processes that race on the same user or seat fail with a
//! serialization error and are retried here. The unique index on
//! `(bus, date, time, seat)` backs the seat check at the store level.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use sea_orm::{
    sqlx, ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, EntityTrait, IsolationLevel, RuntimeErr, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::reservation;
use crate::services::catalog::{BusSchedule, ScheduleCatalog};
use crate::services::locks::KeyedLocks;
use crate::services::{ledger, normalize_departure_time, Requester, Reservation, TripKey};
use crate::utils::clock::Clock;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(25);

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Seat {seat} is already taken")]
    SeatAlreadyTaken { seat: i32 },
    #[error("Reservation limit of {limit} reached")]
    QuotaExceeded { limit: u64 },
    #[error("Reservation not found")]
    NotFound,
    #[error("You can only cancel your own reservations")]
    Forbidden,
    #[error("Reservation conflicted with a concurrent request, please retry")]
    Conflict,
    #[error("Reservation service is busy, please retry")]
    Unavailable,
    #[error("store error: {0}")]
    Store(#[source] DbErr),
}

impl From<DbErr> for AllocationError {
    fn from(err: DbErr) -> Self {
        if matches!(err, DbErr::ConnectionAcquire(_)) {
            AllocationError::Unavailable
        } else if is_serialization_failure(&err) {
            AllocationError::Conflict
        } else {
            AllocationError::Store(err)
        }
    }
}

fn is_serialization_failure(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Query(e) | DbErr::Exec(e) | DbErr::Conn(e) => e,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime else {
        return false;
    };

    // Postgres: 40001 serialization_failure, 40P01 deadlock_detected.
    // SQLite: 5 SQLITE_BUSY, 517 SQLITE_BUSY_SNAPSHOT, 6 SQLITE_LOCKED.
    matches!(
        db_err.code().as_deref(),
        Some("40001" | "40P01" | "5" | "517" | "6")
    ) || db_err.message().contains("database is locked")
}

/// A write touching a seat: unique violations mean another writer got there first.
fn seat_write_error(err: DbErr, seat: i32) -> AllocationError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AllocationError::SeatAlreadyTaken { seat },
        _ => err.into(),
    }
}

#[derive(Debug, Clone)]
pub struct AllocationPolicy {
    /// Live reservations a single user may hold across all trips
    pub quota: u64,
    /// Bookable dates are today and the following `booking_horizon_days - 1` days
    pub booking_horizon_days: i64,
    pub request_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            quota: 2,
            booking_horizon_days: 7,
            request_timeout: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

/// A validated-at-the-boundary request for one seat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeatRequest {
    pub user_id: String,
    pub bus_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub seat_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAvailability {
    pub available: Vec<i32>,
    pub total: i32,
}

pub struct AllocationEngine<C> {
    db: DatabaseConnection,
    catalog: C,
    clock: Arc<dyn Clock>,
    policy: AllocationPolicy,
    user_locks: KeyedLocks<String>,
    trip_locks: KeyedLocks<TripKey>,
}

impl<C: ScheduleCatalog> AllocationEngine<C> {
    pub fn new(
        db: DatabaseConnection,
        catalog: C,
        clock: Arc<dyn Clock>,
        policy: AllocationPolicy,
    ) -> Self {
        Self {
            db,
            catalog,
            clock,
            policy,
            user_locks: KeyedLocks::new(),
            trip_locks: KeyedLocks::new(),
        }
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Assign `seat_number` on the requested trip to the user, or reject.
    pub async fn reserve(&self, request: SeatRequest) -> Result<Reservation, AllocationError> {
        self.bounded("reserve", self.reserve_inner(request)).await
    }

    /// Delete a reservation and free its seat. A reservation that is already
    /// gone yields `NotFound`, which callers treat as "already cancelled".
    pub async fn cancel(
        &self,
        reservation_id: Uuid,
        requester: &Requester,
    ) -> Result<Reservation, AllocationError> {
        self.bounded("cancel", self.cancel_inner(reservation_id, requester))
            .await
    }

    /// Seats of a trip nobody holds, in ascending order.
    pub async fn available_seats(
        &self,
        bus_id: &str,
        date: NaiveDate,
        time: &str,
    ) -> Result<SeatAvailability, AllocationError> {
        self.bounded("available_seats", async {
            let (schedule, time) = self.scheduled_trip(bus_id, time).await?;
            let trip = TripKey {
                bus_id: schedule.bus_id.clone(),
                date,
                time,
            };

            // Waits out any in-flight commit on this trip
            let _trip_guard = self.trip_locks.lock(trip.clone()).await;
            let occupied = ledger::occupied_seats(&self.db, &trip).await?;

            Ok::<_, AllocationError>(SeatAvailability {
                available: (1..=schedule.total_seats)
                    .filter(|seat| !occupied.contains(seat))
                    .collect(),
                total: schedule.total_seats,
            })
        })
        .await
    }

    /// Live reservations on one trip, by seat number.
    pub async fn trip_reservations(
        &self,
        bus_id: &str,
        date: NaiveDate,
        time: &str,
    ) -> Result<Vec<Reservation>, AllocationError> {
        self.bounded("trip_reservations", async {
            let (schedule, time) = self.scheduled_trip(bus_id, time).await?;
            let trip = TripKey {
                bus_id: schedule.bus_id,
                date,
                time,
            };

            let _trip_guard = self.trip_locks.lock(trip.clone()).await;
            Ok::<_, AllocationError>(ledger::reservations_for_trip(&self.db, &trip).await?)
        })
        .await
    }

    async fn reserve_inner(&self, request: SeatRequest) -> Result<Reservation, AllocationError> {
        if request.user_id.trim().is_empty() {
            return Err(AllocationError::InvalidInput("userId must not be empty".to_string()));
        }

        let (schedule, time) = self.scheduled_trip(&request.bus_id, &request.time).await?;
        self.check_bookable_date(request.date)?;

        let seat = request.seat_number;
        if seat < 1 || seat > schedule.total_seats {
            return Err(AllocationError::InvalidInput(format!(
                "Seat number must be between 1 and {}",
                schedule.total_seats
            )));
        }

        let trip = TripKey {
            bus_id: schedule.bus_id.clone(),
            date: request.date,
            time,
        };

        let _user_guard = self.user_locks.lock(request.user_id.clone()).await;
        let _trip_guard = self.trip_locks.lock(trip.clone()).await;

        let user_id = request.user_id.as_str();
        let (trip_ref, schedule_ref) = (&trip, &schedule);
        let result = self
            .with_retry("reserve", move || {
                self.commit_reservation(user_id, trip_ref, seat, schedule_ref)
            })
            .await;

        match &result {
            Ok(reservation) => tracing::info!(
                reservation_id = %reservation.id,
                user_id = %user_id,
                trip = %trip,
                seat,
                "Seat reserved"
            ),
            Err(err) => tracing::debug!(
                user_id = %user_id,
                trip = %trip,
                seat,
                error = %err,
                "Reservation rejected"
            ),
        }

        result
    }

    async fn commit_reservation(
        &self,
        user_id: &str,
        trip: &TripKey,
        seat: i32,
        schedule: &BusSchedule,
    ) -> Result<Reservation, AllocationError> {
        // Dropping the transaction on any early return rolls it back
        let txn = self.begin().await?;

        let occupied = ledger::occupied_seats(&txn, trip).await?;
        if occupied.contains(&seat) {
            return Err(AllocationError::SeatAlreadyTaken { seat });
        }

        let held = ledger::live_count_for_user(&txn, user_id).await?;
        if held >= self.policy.quota {
            return Err(AllocationError::QuotaExceeded {
                limit: self.policy.quota,
            });
        }

        let reservation = reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            bus_id: Set(trip.bus_id.clone()),
            seat_number: Set(seat),
            trip_date: Set(trip.date),
            departure_time: Set(trip.time.clone()),
            departure_location: Set(schedule.departure_location.clone()),
            arrival_location: Set(schedule.arrival_location.clone()),
            created_at: Set(self.clock.now().into()),
        }
        .insert(&txn)
        .await
        .map_err(|e| seat_write_error(e, seat))?;

        txn.commit().await.map_err(|e| seat_write_error(e, seat))?;

        Ok(reservation)
    }

    async fn cancel_inner(
        &self,
        reservation_id: Uuid,
        requester: &Requester,
    ) -> Result<Reservation, AllocationError> {
        let reservation = ledger::find(&self.db, reservation_id)
            .await?
            .ok_or(AllocationError::NotFound)?;

        if !requester.owns_or_administers(&reservation) {
            return Err(AllocationError::Forbidden);
        }

        let trip = reservation.trip_key();
        let _user_guard = self.user_locks.lock(reservation.user_id.clone()).await;
        let _trip_guard = self.trip_locks.lock(trip.clone()).await;

        self.with_retry("cancel", move || self.commit_cancellation(reservation_id))
            .await?;

        tracing::info!(
            reservation_id = %reservation_id,
            user_id = %reservation.user_id,
            cancelled_by = %requester.user_id,
            trip = %trip,
            seat = reservation.seat_number,
            "Reservation cancelled"
        );

        Ok(reservation)
    }

    async fn commit_cancellation(&self, reservation_id: Uuid) -> Result<(), AllocationError> {
        let txn = self.begin().await?;

        let result = reservation::Entity::delete_by_id(reservation_id)
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AllocationError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    /// Resolve a bus and departure time against the catalog.
    async fn scheduled_trip(
        &self,
        bus_id: &str,
        raw_time: &str,
    ) -> Result<(BusSchedule, String), AllocationError> {
        let time = normalize_departure_time(raw_time).ok_or_else(|| {
            AllocationError::InvalidInput(format!("Invalid departure time {:?}, expected HH:MM", raw_time))
        })?;

        let schedule = self
            .catalog
            .get_bus(bus_id)
            .await?
            .ok_or_else(|| AllocationError::InvalidInput(format!("Unknown bus {}", bus_id)))?;

        if !schedule.departs_at(&time) {
            return Err(AllocationError::InvalidInput(format!(
                "Bus {} has no departure at {}",
                bus_id, time
            )));
        }

        Ok((schedule, time))
    }

    fn check_bookable_date(&self, date: NaiveDate) -> Result<(), AllocationError> {
        let today = self.clock.today();
        if date < today {
            return Err(AllocationError::InvalidInput(
                "Cannot reserve seats for past dates".to_string(),
            ));
        }

        let horizon = u64::try_from(self.policy.booking_horizon_days).unwrap_or(0);
        let last_bookable = today
            .checked_add_days(Days::new(horizon.saturating_sub(1)))
            .unwrap_or(NaiveDate::MAX);
        if date > last_bookable {
            return Err(AllocationError::InvalidInput(format!(
                "Reservations open {} days ahead, latest bookable date is {}",
                self.policy.booking_horizon_days, last_bookable
            )));
        }

        Ok(())
    }

    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        match self.db.get_database_backend() {
            DbBackend::Postgres => {
                self.db
                    .begin_with_config(Some(IsolationLevel::Serializable), None)
                    .await
            }
            _ => self.db.begin().await,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, AllocationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AllocationError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Err(AllocationError::Conflict) if attempt < self.policy.max_attempts => {
                    let backoff = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(operation, attempt, ?backoff, "Transaction conflict, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, AllocationError>>,
    ) -> Result<T, AllocationError> {
        match tokio::time::timeout(self.policy.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.policy.request_timeout, "Operation timed out");
                Err(AllocationError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{TimeZone, Utc};
    use sea_orm::sqlx::error::{DatabaseError, ErrorKind};
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::catalog::{self, BusSeed, DbScheduleCatalog};
    use crate::utils::clock::FixedClock;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct StoreFailure {
        code: &'static str,
        message: &'static str,
    }

    impl DatabaseError for StoreFailure {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn store_failure(code: &'static str, message: &'static str) -> DbErr {
        let err = sqlx::Error::Database(Box::new(StoreFailure { code, message }));
        DbErr::Exec(RuntimeErr::SqlxError(err))
    }

    async fn memory_db() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn engine(db: DatabaseConnection, max_attempts: u32) -> AllocationEngine<DbScheduleCatalog> {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 30, 6, 0, 0).unwrap());
        AllocationEngine::new(
            db.clone(),
            DbScheduleCatalog::new(db),
            Arc::new(clock),
            AllocationPolicy {
                max_attempts,
                ..AllocationPolicy::default()
            },
        )
    }

    #[test]
    fn test_serialization_failures_are_conflicts() {
        let err = store_failure("40001", "could not serialize access due to concurrent update");
        assert!(matches!(AllocationError::from(err), AllocationError::Conflict));

        let err = store_failure("40P01", "deadlock detected");
        assert!(matches!(AllocationError::from(err), AllocationError::Conflict));

        let err = store_failure("517", "database is locked");
        assert!(matches!(AllocationError::from(err), AllocationError::Conflict));
    }

    #[test]
    fn test_other_store_errors_are_not_retried() {
        let err = store_failure("42P01", "relation \"reservation\" does not exist");
        assert!(matches!(AllocationError::from(err), AllocationError::Store(_)));

        // Only the structured code counts, not text that happens to mention one
        let err = DbErr::Custom("error 40001 in application code".into());
        assert!(matches!(AllocationError::from(err), AllocationError::Store(_)));
    }

    #[test]
    fn test_seat_write_error_passes_through_non_unique_errors() {
        let err = store_failure("40001", "could not serialize access");
        assert!(matches!(seat_write_error(err, 4), AllocationError::Conflict));
    }

    #[tokio::test]
    async fn test_unique_index_violation_is_seat_taken() {
        let db = memory_db().await;
        let bus = BusSeed {
            id: "B1".to_string(),
            departure_location: "Seosan".to_string(),
            arrival_location: "Hanseo University".to_string(),
            total_seats: 10,
            departure_times: vec!["08:00".to_string()],
        };
        catalog::insert_bus(&db, &bus).await.unwrap();

        let row = || reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set("U1".to_string()),
            bus_id: Set("B1".to_string()),
            seat_number: Set(4),
            trip_date: Set(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            departure_time: Set("08:00".to_string()),
            departure_location: Set("Seosan".to_string()),
            arrival_location: Set("Hanseo University".to_string()),
            created_at: Set(Utc::now().into()),
        };

        row().insert(&db).await.unwrap();
        let err = row().insert(&db).await.unwrap_err();
        assert!(matches!(
            seat_write_error(err, 4),
            AllocationError::SeatAlreadyTaken { seat: 4 }
        ));
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_until_success() {
        let engine = engine(memory_db().await, 3);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = engine
            .with_retry("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AllocationError::Conflict)
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let engine = engine(memory_db().await, 3);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = engine
            .with_retry("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AllocationError::Conflict)
            })
            .await;

        assert!(matches!(result, Err(AllocationError::Conflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_rejections_are_not_retried() {
        let engine = engine(memory_db().await, 3);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = engine
            .with_retry("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AllocationError::SeatAlreadyTaken { seat: 1 })
            })
            .await;

        assert!(matches!(result, Err(AllocationError::SeatAlreadyTaken { seat: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_seat_request_rejects_unknown_fields() {
        let body = r#"{"userId":"U1","busId":"B1","date":"2024-06-01","time":"08:00","seatNumber":3,"price":10}"#;
        assert!(serde_json::from_str::<SeatRequest>(body).is_err());

        let body = r#"{"userId":"U1","busId":"B1","date":"2024-06-01","time":"08:00"}"#;
        assert!(serde_json::from_str::<SeatRequest>(body).is_err());

        let body = r#"{"userId":"U1","busId":"B1","date":"2024-06-01","time":"08:00","seatNumber":3}"#;
        let request: SeatRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.seat_number, 3);
        assert_eq!(request.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}
