pub mod allocation;
pub mod catalog;
pub mod ledger;
pub mod locks;
pub mod views;

use std::fmt;

use chrono::{NaiveDate, NaiveTime};

pub use allocation::{AllocationEngine, AllocationError, AllocationPolicy, SeatAvailability, SeatRequest};
pub use catalog::{BusSchedule, DbScheduleCatalog, ScheduleCatalog};

use crate::entities::reservation;

pub type Reservation = reservation::Model;

/// One contended seating inventory: a bus departing at `time` on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripKey {
    pub bus_id: String,
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.bus_id, self.date, self.time)
    }
}

/// Who is asking for a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub is_admin: bool,
}

impl Requester {
    pub fn owns_or_administers(&self, reservation: &Reservation) -> bool {
        self.is_admin || self.user_id == reservation.user_id
    }
}

/// Normalize a departure time to zero-padded `HH:MM`.
pub fn normalize_departure_time(raw: &str) -> Option<String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_departure_time() {
        assert_eq!(normalize_departure_time("08:00").as_deref(), Some("08:00"));
        assert_eq!(normalize_departure_time("8:05").as_deref(), Some("08:05"));
        assert_eq!(normalize_departure_time("24:00"), None);
        assert_eq!(normalize_departure_time("noon"), None);
    }

    #[test]
    fn test_trip_key_display() {
        let trip = TripKey {
            bus_id: "B1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: "08:00".to_string(),
        };
        assert_eq!(trip.to_string(), "B1/2024-06-01/08:00");
    }
}
