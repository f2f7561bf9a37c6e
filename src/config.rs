use std::env;
use std::time::Duration;

use crate::services::AllocationPolicy;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub reservation_quota: u64,
    pub booking_horizon_days: i64,
    pub request_timeout_ms: u64,
    pub commit_max_attempts: u32,
    pub max_in_flight_requests: usize,
    pub catalog_seed_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            reservation_quota: env::var("RESERVATION_QUOTA")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("RESERVATION_QUOTA must be a number"),
            booking_horizon_days: env::var("BOOKING_HORIZON_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .expect("BOOKING_HORIZON_DAYS must be a number"),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("REQUEST_TIMEOUT_MS must be a number"),
            commit_max_attempts: env::var("COMMIT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("COMMIT_MAX_ATTEMPTS must be a number"),
            max_in_flight_requests: env::var("MAX_IN_FLIGHT_REQUESTS")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .expect("MAX_IN_FLIGHT_REQUESTS must be a number"),
            catalog_seed_path: env::var("CATALOG_SEED_PATH").ok(),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn allocation_policy(&self) -> AllocationPolicy {
        AllocationPolicy {
            quota: self.reservation_quota,
            booking_horizon_days: self.booking_horizon_days,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_attempts: self.commit_max_attempts.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "secret".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            reservation_quota: 2,
            booking_horizon_days: 7,
            request_timeout_ms: 1500,
            commit_max_attempts: 0,
            max_in_flight_requests: 16,
            catalog_seed_path: None,
        }
    }

    #[test]
    fn test_server_addr() {
        assert_eq!(config().server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_allocation_policy_always_attempts_once() {
        let policy = config().allocation_policy();
        assert_eq!(policy.quota, 2);
        assert_eq!(policy.booking_horizon_days, 7);
        assert_eq!(policy.request_timeout, Duration::from_millis(1500));
        assert_eq!(policy.max_attempts, 1);
    }
}
