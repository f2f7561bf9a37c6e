pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::services::{AllocationEngine, DbScheduleCatalog};
use crate::utils::clock::{Clock, SystemClock};

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub engine: Arc<AllocationEngine<DbScheduleCatalog>>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: DatabaseConnection, config: Config, clock: Arc<dyn Clock>) -> Self {
        let engine = AllocationEngine::new(
            db.clone(),
            DbScheduleCatalog::new(db.clone()),
            clock,
            config.allocation_policy(),
        );

        Self {
            db,
            config,
            engine: Arc::new(engine),
        }
    }
}
