use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::{DbError, LinkOutcome, NewStationRecord};
use crate::domain::geo::BoundingBox;
use crate::domain::models::{Brand, FuelKind, NewReport, Report, Station};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub stations: i64,
    pub linked_stations: i64,
    pub reports: i64,
}

pub trait StationQueryHandler {
    fn get_station(&self, station_id: &str) -> Result<Option<Station>, ServiceError>;
    fn find_station_by_place_id(&self, place_id: &str) -> Result<Option<String>, ServiceError>;
    fn list_stations_in_bounds(
        &self,
        bounds: &BoundingBox,
        keyword: Option<&str>,
    ) -> Result<Vec<Station>, ServiceError>;
    fn list_reports(&self, station_id: &str, limit: u32) -> Result<Vec<Report>, ServiceError>;
    fn list_favorites(&self, user_id: &str) -> Result<Vec<Station>, ServiceError>;
    fn get_schema_version(&self) -> Result<u32, ServiceError>;
    fn counts(&self) -> Result<StoreCounts, ServiceError>;
}

pub trait StationCommandHandler {
    fn link_place(&self, new_station: &NewStationRecord) -> Result<LinkOutcome, ServiceError>;
    fn insert_report(
        &self,
        station_id: &str,
        user_id: Option<&str>,
        report: &NewReport,
        submitted_at: &str,
    ) -> Result<Report, ServiceError>;
    fn add_favorite(
        &self,
        user_id: &str,
        station_id: &str,
        created_at: &str,
    ) -> Result<bool, ServiceError>;
    fn apply_price_update(
        &self,
        fuel_kind: FuelKind,
        brand: Option<Brand>,
        price: f64,
    ) -> Result<usize, ServiceError>;
}

#[derive(Clone)]
pub struct SqliteStationService {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStationService {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        op(&connection).map_err(ServiceError::from)
    }
}

impl StationQueryHandler for SqliteStationService {
    fn get_station(&self, station_id: &str) -> Result<Option<Station>, ServiceError> {
        self.with_connection(|connection| db::get_station(connection, station_id))
    }

    fn find_station_by_place_id(&self, place_id: &str) -> Result<Option<String>, ServiceError> {
        self.with_connection(|connection| db::find_station_by_place_id(connection, place_id))
    }

    fn list_stations_in_bounds(
        &self,
        bounds: &BoundingBox,
        keyword: Option<&str>,
    ) -> Result<Vec<Station>, ServiceError> {
        self.with_connection(|connection| db::list_stations_in_bounds(connection, bounds, keyword))
    }

    fn list_reports(&self, station_id: &str, limit: u32) -> Result<Vec<Report>, ServiceError> {
        self.with_connection(|connection| {
            db::list_reports_for_station(connection, station_id, limit)
        })
    }

    fn list_favorites(&self, user_id: &str) -> Result<Vec<Station>, ServiceError> {
        self.with_connection(|connection| db::list_favorites(connection, user_id))
    }

    fn get_schema_version(&self) -> Result<u32, ServiceError> {
        self.with_connection(db::schema_version)
    }

    fn counts(&self) -> Result<StoreCounts, ServiceError> {
        self.with_connection(|connection| {
            Ok(StoreCounts {
                stations: db::count_stations(connection)?,
                linked_stations: db::count_linked_stations(connection)?,
                reports: db::count_reports(connection)?,
            })
        })
    }
}

impl StationCommandHandler for SqliteStationService {
    fn link_place(&self, new_station: &NewStationRecord) -> Result<LinkOutcome, ServiceError> {
        self.with_connection(|connection| db::link_place(connection, new_station))
    }

    fn insert_report(
        &self,
        station_id: &str,
        user_id: Option<&str>,
        report: &NewReport,
        submitted_at: &str,
    ) -> Result<Report, ServiceError> {
        self.with_connection(|connection| {
            db::insert_report(connection, station_id, user_id, report, submitted_at)
        })
    }

    fn add_favorite(
        &self,
        user_id: &str,
        station_id: &str,
        created_at: &str,
    ) -> Result<bool, ServiceError> {
        self.with_connection(|connection| {
            db::add_favorite(connection, user_id, station_id, created_at)
        })
    }

    fn apply_price_update(
        &self,
        fuel_kind: FuelKind,
        brand: Option<Brand>,
        price: f64,
    ) -> Result<usize, ServiceError> {
        self.with_connection(|connection| {
            db::apply_price_update(connection, fuel_kind, brand, price)
        })
    }
}
