use std::path::Path;

use fuel_finder_api::adapters::db::{
    NewStationRecord, insert_report, insert_station, open_connection, run_migrations,
    schema_version,
};
use fuel_finder_api::domain::clock::{Clock, SystemClock};
use fuel_finder_api::domain::models::{Brand, Coordinates, FuelKind, NewReport, QueueLength};
use rusqlite::Connection;

fn main() {
    if let Err(error) = run() {
        eprintln!("failed to create test db: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut path = if cfg!(windows) {
        ".\\data\\fuel_test.db".to_string()
    } else {
        "./data/fuel_test.db".to_string()
    };
    let mut force = false;
    let mut seed = false;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--path" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--path requires a value".to_string());
                };
                path = value.clone();
                index += 2;
            }
            "--force" => {
                force = true;
                index += 1;
            }
            "--seed" => {
                seed = true;
                index += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let path_ref = Path::new(&path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if force && path_ref.exists() {
        std::fs::remove_file(path_ref)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let mut connection = open_connection(&path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let version = schema_version(&connection).map_err(|error| error.to_string())?;
    let stations = if seed {
        seed_stations(&connection)?
    } else {
        0
    };

    println!("created/updated test db at: {path}");
    println!("schema version: {version}");
    if seed {
        println!("seeded stations: {stations}");
    }
    Ok(())
}

fn print_help() {
    println!("create_test_db");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_test_db -- [--path <file>] [--force] [--seed]");
    println!();
    println!("Options:");
    println!(
        "  --path <file>   target sqlite file (default: ./data/fuel_test.db)"
    );
    println!("  --force         delete existing file before creating");
    println!("  --seed          insert a few Colombo stations with sample reports");
}

const SEED_STATIONS: &[(&str, Brand, f64, f64, &str)] = &[
    ("Ceypetco Kollupitiya", Brand::Ceypetco, 6.9114, 79.8511, "Galle Rd, Colombo 03"),
    ("Lanka IOC Borella", Brand::LankaIoc, 6.9147, 79.8778, "D S Senanayake Mawatha, Colombo 08"),
    ("Sinopec Dehiwala", Brand::Sinopec, 6.8510, 79.8650, "Galle Rd, Dehiwala"),
];

fn seed_stations(connection: &Connection) -> Result<usize, String> {
    let now = SystemClock.now().to_iso8601();

    for (name, brand, lat, lng, address) in SEED_STATIONS {
        let station_id = insert_station(
            connection,
            &NewStationRecord {
                name: (*name).to_string(),
                brand: *brand,
                location: Coordinates { lat: *lat, lng: *lng },
                address: Some((*address).to_string()),
                opening_hours: None,
                place_id: None,
                created_at: now.clone(),
            },
        )
        .map_err(|error| error.to_string())?;

        insert_report(
            connection,
            &station_id,
            None,
            &NewReport {
                fuel_kind: FuelKind::Petrol92,
                available: true,
                price: Some(366.0),
                queue_length: QueueLength::Short,
                comment: None,
            },
            &now,
        )
        .map_err(|error| error.to_string())?;
    }

    Ok(SEED_STATIONS.len())
}
