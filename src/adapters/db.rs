use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use thiserror::Error;

use crate::domain::fuel_status::{complete_statuses, status_from_report};
use crate::domain::geo::BoundingBox;
use crate::domain::models::{
    Brand, Coordinates, FuelKind, FuelStatus, NewReport, Report, Station, StationSource,
    UnknownVariant,
};

pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        r#"
CREATE TABLE IF NOT EXISTS stations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    brand TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    address TEXT,
    opening_hours TEXT,
    place_id TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stations_lat_lng
ON stations (latitude, longitude);

CREATE TABLE IF NOT EXISTS fuel_statuses (
    station_id TEXT NOT NULL REFERENCES stations (id),
    fuel_kind TEXT NOT NULL,
    available INTEGER NOT NULL,
    price REAL,
    queue_length TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    PRIMARY KEY (station_id, fuel_kind)
);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    station_id TEXT NOT NULL REFERENCES stations (id),
    fuel_kind TEXT NOT NULL,
    available INTEGER NOT NULL,
    price REAL,
    queue_length TEXT NOT NULL,
    comment TEXT,
    user_id TEXT,
    submitted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_station_submitted_desc
ON reports (station_id, submitted_at DESC);
"#,
    ),
    (
        2,
        r#"
CREATE TABLE IF NOT EXISTS favorites (
    user_id TEXT NOT NULL,
    station_id TEXT NOT NULL REFERENCES stations (id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, station_id)
);
"#,
    ),
];

const STATION_COLUMNS: &str =
    "id, name, brand, latitude, longitude, address, opening_hours, place_id";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("station not found: {0}")]
    StationNotFound(String),
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    let connection = Connection::open(path)?;
    connection.pragma_update(None, "foreign_keys", true)?;
    Ok(connection)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStationRecord {
    pub name: String,
    pub brand: Brand,
    pub location: Coordinates,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub place_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub station_id: String,
    pub already_linked: bool,
}

pub fn insert_station(
    connection: &Connection,
    new_station: &NewStationRecord,
) -> Result<String, DbError> {
    let id = uuid::Uuid::new_v4().to_string();

    connection.execute(
        "INSERT INTO stations (id, name, brand, latitude, longitude, address, opening_hours, place_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            new_station.name,
            new_station.brand.as_str(),
            new_station.location.lat,
            new_station.location.lng,
            new_station.address,
            new_station.opening_hours,
            new_station.place_id,
            new_station.created_at,
        ],
    )?;

    Ok(id)
}

pub fn get_station(connection: &Connection, station_id: &str) -> Result<Option<Station>, DbError> {
    let station = connection
        .query_row(
            &format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?1"),
            params![station_id],
            station_from_row,
        )
        .optional()?;

    match station {
        Some(station) => Ok(Some(with_statuses(connection, station)?)),
        None => Ok(None),
    }
}

pub fn find_station_by_place_id(
    connection: &Connection,
    place_id: &str,
) -> Result<Option<String>, DbError> {
    let id = connection
        .query_row(
            "SELECT id FROM stations WHERE place_id = ?1",
            params![place_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// SQLite `lower()` folds ASCII only, so the pattern is folded the same way.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn list_stations_in_bounds(
    connection: &Connection,
    bounds: &BoundingBox,
    keyword: Option<&str>,
) -> Result<Vec<Station>, DbError> {
    let pattern = keyword
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| format!("%{}%", escape_like(&value.to_ascii_lowercase())));

    let mut statement = connection.prepare(&format!(
        "SELECT {STATION_COLUMNS}
         FROM stations
         WHERE latitude BETWEEN ?1 AND ?2
           AND longitude BETWEEN ?3 AND ?4
           AND (?5 IS NULL
                OR lower(name) LIKE ?5 ESCAPE '\\'
                OR lower(coalesce(address, '')) LIKE ?5 ESCAPE '\\')
         ORDER BY name, id"
    ))?;

    let rows = statement.query_map(
        params![
            bounds.min_lat,
            bounds.max_lat,
            bounds.min_lng,
            bounds.max_lng,
            pattern
        ],
        station_from_row,
    )?;

    let mut stations = Vec::new();
    for row in rows {
        stations.push(with_statuses(connection, row?)?);
    }

    Ok(stations)
}

/// Promotes a place to an internal station. Already linked places keep their id.
pub fn link_place(
    connection: &Connection,
    new_station: &NewStationRecord,
) -> Result<LinkOutcome, DbError> {
    let Some(place_id) = new_station.place_id.as_deref() else {
        let station_id = insert_station(connection, new_station)?;
        return Ok(LinkOutcome {
            station_id,
            already_linked: false,
        });
    };

    if let Some(station_id) = find_station_by_place_id(connection, place_id)? {
        return Ok(LinkOutcome {
            station_id,
            already_linked: true,
        });
    }

    match insert_station(connection, new_station) {
        Ok(station_id) => Ok(LinkOutcome {
            station_id,
            already_linked: false,
        }),
        Err(DbError::Sqlite(rusqlite::Error::SqliteFailure(error, _)))
            if error.code == ErrorCode::ConstraintViolation =>
        {
            let station_id = find_station_by_place_id(connection, place_id)?
                .ok_or_else(|| DbError::StationNotFound(place_id.to_string()))?;
            Ok(LinkOutcome {
                station_id,
                already_linked: true,
            })
        }
        Err(error) => Err(error),
    }
}

/// Persists the report and folds it into the station's fuel status atomically.
pub fn insert_report(
    connection: &Connection,
    station_id: &str,
    user_id: Option<&str>,
    new_report: &NewReport,
    submitted_at: &str,
) -> Result<Report, DbError> {
    let transaction = connection.unchecked_transaction()?;

    let exists: bool = transaction.query_row(
        "SELECT EXISTS (SELECT 1 FROM stations WHERE id = ?1)",
        params![station_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(DbError::StationNotFound(station_id.to_string()));
    }

    let report = Report {
        id: uuid::Uuid::new_v4().to_string(),
        station_id: station_id.to_string(),
        fuel_kind: new_report.fuel_kind,
        available: new_report.available,
        price: new_report.price,
        queue_length: new_report.queue_length,
        comment: new_report.comment.clone(),
        user_id: user_id.map(ToString::to_string),
        submitted_at: submitted_at.to_string(),
    };
    let status = status_from_report(&report);

    transaction.execute(
        "INSERT INTO reports (id, station_id, fuel_kind, available, price, queue_length, comment, user_id, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            report.id,
            report.station_id,
            report.fuel_kind.as_str(),
            status.available,
            status.price,
            status.queue_length.as_str(),
            report.comment,
            report.user_id,
            report.submitted_at,
        ],
    )?;

    transaction.execute(
        "INSERT INTO fuel_statuses (station_id, fuel_kind, available, price, queue_length, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (station_id, fuel_kind) DO UPDATE SET
            available = excluded.available,
            price = excluded.price,
            queue_length = excluded.queue_length,
            last_updated = excluded.last_updated",
        params![
            report.station_id,
            status.fuel_kind.as_str(),
            status.available,
            status.price,
            status.queue_length.as_str(),
            report.submitted_at,
        ],
    )?;

    transaction.commit()?;

    Ok(Report {
        price: status.price,
        queue_length: status.queue_length,
        ..report
    })
}

pub fn list_reports_for_station(
    connection: &Connection,
    station_id: &str,
    limit: u32,
) -> Result<Vec<Report>, DbError> {
    let mut statement = connection.prepare(
        "SELECT id, station_id, fuel_kind, available, price, queue_length, comment, user_id, submitted_at
         FROM reports
         WHERE station_id = ?1
         ORDER BY submitted_at DESC, rowid DESC
         LIMIT ?2",
    )?;

    let rows = statement.query_map(params![station_id, i64::from(limit)], |row| {
        Ok(Report {
            id: row.get(0)?,
            station_id: row.get(1)?,
            fuel_kind: parse_column(row, 2)?,
            available: row.get(3)?,
            price: row.get(4)?,
            queue_length: parse_column(row, 5)?,
            comment: row.get(6)?,
            user_id: row.get(7)?,
            submitted_at: row.get(8)?,
        })
    })?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(row?);
    }

    Ok(reports)
}

/// Returns `true` when the favorite was newly recorded.
pub fn add_favorite(
    connection: &Connection,
    user_id: &str,
    station_id: &str,
    created_at: &str,
) -> Result<bool, DbError> {
    let exists: bool = connection.query_row(
        "SELECT EXISTS (SELECT 1 FROM stations WHERE id = ?1)",
        params![station_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(DbError::StationNotFound(station_id.to_string()));
    }

    let inserted = connection.execute(
        "INSERT OR IGNORE INTO favorites (user_id, station_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, station_id, created_at],
    )?;

    Ok(inserted > 0)
}

pub fn list_favorites(connection: &Connection, user_id: &str) -> Result<Vec<Station>, DbError> {
    let mut statement = connection.prepare(
        "SELECT s.id, s.name, s.brand, s.latitude, s.longitude, s.address, s.opening_hours, s.place_id
         FROM favorites f
         JOIN stations s ON s.id = f.station_id
         WHERE f.user_id = ?1
         ORDER BY f.created_at DESC, s.id",
    )?;

    let rows = statement.query_map(params![user_id], station_from_row)?;

    let mut stations = Vec::new();
    for row in rows {
        stations.push(with_statuses(connection, row?)?);
    }

    Ok(stations)
}

/// Updates the price of every available status of `fuel_kind`, optionally per brand.
pub fn apply_price_update(
    connection: &Connection,
    fuel_kind: FuelKind,
    brand: Option<Brand>,
    price: f64,
) -> Result<usize, DbError> {
    let updated = connection.execute(
        "UPDATE fuel_statuses
         SET price = ?1
         WHERE fuel_kind = ?2
           AND available = 1
           AND (?3 IS NULL OR station_id IN (SELECT id FROM stations WHERE brand = ?3))",
        params![price, fuel_kind.as_str(), brand.map(Brand::as_str)],
    )?;
    Ok(updated)
}

pub fn count_stations(connection: &Connection) -> Result<i64, DbError> {
    count(connection, "SELECT COUNT(*) FROM stations")
}

pub fn count_linked_stations(connection: &Connection) -> Result<i64, DbError> {
    count(
        connection,
        "SELECT COUNT(*) FROM stations WHERE place_id IS NOT NULL",
    )
}

pub fn count_reports(connection: &Connection) -> Result<i64, DbError> {
    count(connection, "SELECT COUNT(*) FROM reports")
}

fn count(connection: &Connection, sql: &str) -> Result<i64, DbError> {
    let value = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(value)
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<Station> {
    let place_id: Option<String> = row.get(7)?;

    Ok(Station {
        id: row.get(0)?,
        name: row.get(1)?,
        brand: parse_column(row, 2)?,
        location: Coordinates {
            lat: row.get(3)?,
            lng: row.get(4)?,
        },
        address: row.get(5)?,
        opening_hours: row.get(6)?,
        fuel_statuses: Vec::new(),
        source: StationSource::Internal,
        is_linked: place_id.is_some(),
        place_id,
        distance_m: None,
    })
}

fn with_statuses(connection: &Connection, mut station: Station) -> Result<Station, DbError> {
    let mut statement = connection.prepare_cached(
        "SELECT fuel_kind, available, price, queue_length, last_updated
         FROM fuel_statuses
         WHERE station_id = ?1",
    )?;

    let rows = statement.query_map(params![station.id], |row| {
        Ok(FuelStatus {
            fuel_kind: parse_column(row, 0)?,
            available: row.get(1)?,
            price: row.get(2)?,
            queue_length: parse_column(row, 3)?,
            last_updated: row.get(4)?,
        })
    })?;

    let mut statuses = Vec::new();
    for row in rows {
        statuses.push(row?);
    }

    station.fuel_statuses = complete_statuses(statuses);
    Ok(station)
}

fn parse_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(index)?;
    raw.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}
