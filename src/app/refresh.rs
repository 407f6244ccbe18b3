use serde_json::Value;

use crate::adapters::price_feed::{HttpPriceFeed, PriceFeedError, parse_price_entry};
use crate::app::services::StationCommandHandler;
use crate::domain::payloads::RefreshSummary;

/// Fetches the current price list and applies it to the store.
pub async fn run_refresh<S>(feed: &HttpPriceFeed, stations: &S) -> Result<RefreshSummary, PriceFeedError>
where
    S: StationCommandHandler,
{
    let entries = feed.fetch_entries().await?;
    Ok(apply_entries(stations, &entries))
}

/// Only statuses that are currently available receive the new price; their
/// `last_updated` stays tied to the last crowd report.
pub fn apply_entries<S>(stations: &S, entries: &[Value]) -> RefreshSummary
where
    S: StationCommandHandler,
{
    let mut summary = RefreshSummary::default();

    for (index, raw) in entries.iter().enumerate() {
        let entry = match parse_price_entry(raw) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(index, error = %error, "skipping malformed price entry");
                summary.errors += 1;
                continue;
            }
        };

        match stations.apply_price_update(entry.fuel_kind, entry.brand, entry.price) {
            Ok(updated) => {
                tracing::debug!(
                    fuel_kind = %entry.fuel_kind,
                    brand = entry.brand.map(|brand| brand.as_str()),
                    price = entry.price,
                    updated,
                    "price update applied"
                );
                summary.updated += updated;
            }
            Err(error) => {
                tracing::warn!(index, error = %error, "failed to apply price update");
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        entries = entries.len(),
        updated = summary.updated,
        errors = summary.errors,
        "price refresh finished"
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{HttpResponse, web};
    use serde_json::json;

    use super::{apply_entries, run_refresh};
    use crate::adapters::db::{NewStationRecord, insert_report, insert_station};
    use crate::adapters::price_feed::HttpPriceFeed;
    use crate::app::services::{SqliteStationService, StationQueryHandler};
    use crate::domain::models::{Brand, Coordinates, FuelKind, NewReport, QueueLength};
    use crate::test_support::{open_test_connection, spawn_stub};

    fn seeded(name: &str) -> (SqliteStationService, String, String) {
        let connection = open_test_connection(name);
        let mut ids = Vec::new();
        for (station_name, brand) in [("Ceypetco Wellawatte", Brand::Ceypetco), ("Sinopec Hunupitiya", Brand::Sinopec)] {
            let id = insert_station(
                &connection,
                &NewStationRecord {
                    name: station_name.to_string(),
                    brand,
                    location: Coordinates { lat: 6.87, lng: 79.86 },
                    address: None,
                    opening_hours: None,
                    place_id: None,
                    created_at: "2026-03-01T07:00:00.000Z".to_string(),
                },
            )
            .expect("station should insert");
            insert_report(
                &connection,
                &id,
                None,
                &NewReport {
                    fuel_kind: FuelKind::Petrol92,
                    available: true,
                    price: Some(366.0),
                    queue_length: QueueLength::Short,
                    comment: None,
                },
                "2026-03-01T08:00:00.000Z",
            )
            .expect("report should persist");
            ids.push(id);
        }
        let sinopec = ids.pop().unwrap_or_default();
        let ceypetco = ids.pop().unwrap_or_default();
        (
            SqliteStationService::new(Arc::new(Mutex::new(connection))),
            ceypetco,
            sinopec,
        )
    }

    fn price(service: &SqliteStationService, station_id: &str) -> Option<f64> {
        service
            .get_station(station_id)
            .expect("station should load")
            .and_then(|station| station.fuel_status(FuelKind::Petrol92).and_then(|s| s.price))
    }

    #[test]
    fn applies_brand_scoped_and_global_prices() {
        let (service, ceypetco, sinopec) = seeded("refresh-apply");

        let summary = apply_entries(
            &service,
            &[
                json!({ "fuelKind": "petrol_92", "brand": "sinopec", "price": 371.0 }),
                json!({ "fuel": "super_diesel", "price": 389.0 }),
                json!({ "fuelKind": "kerosene", "price": 180.0 }),
                json!("not an object"),
            ],
        );

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(price(&service, &ceypetco), Some(366.0));
        assert_eq!(price(&service, &sinopec), Some(371.0));
    }

    #[test]
    fn keeps_report_timestamp_when_price_changes() {
        let (service, ceypetco, _) = seeded("refresh-timestamp");

        apply_entries(&service, &[json!({ "fuelKind": "petrol_92", "price": 377.0 })]);

        let station = service
            .get_station(&ceypetco)
            .expect("station should load")
            .expect("station should exist");
        let status = station
            .fuel_status(FuelKind::Petrol92)
            .expect("status should exist");
        assert_eq!(status.price, Some(377.0));
        assert_eq!(status.last_updated.as_deref(), Some("2026-03-01T08:00:00.000Z"));
    }

    async fn prices() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "prices": [
                { "product": "Petrol 92", "price_lkr": "Rs. 309.00" },
                { "product": "Auto Diesel", "price_lkr": "286" }
            ]
        }))
    }

    fn feed_routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/prices", web::get().to(prices));
    }

    #[actix_web::test]
    async fn fetches_feed_and_updates_store() {
        let (service, ceypetco, sinopec) = seeded("refresh-feed");
        let feed = HttpPriceFeed::new(&format!("{}/prices", spawn_stub(feed_routes)))
            .expect("feed client builds");

        let summary = run_refresh(&feed, &service)
            .await
            .expect("refresh should succeed");

        assert_eq!(summary.updated, 2);
        assert_eq!(summary.errors, 0);
        assert_eq!(price(&service, &ceypetco), Some(309.0));
        assert_eq!(price(&service, &sinopec), Some(309.0));
    }
}
