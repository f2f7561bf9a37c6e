pub mod bus;
pub mod bus_departure;
pub mod reservation;
