use std::collections::HashSet;

use crate::domain::geo::haversine_distance_m;
use crate::domain::models::{Coordinates, Station};

/// Combines internal and external station lists.
///
/// Internal entries win: an external entry is dropped when its id matches the
/// id or the linked place id of any internal entry. Matching is exact on the
/// identifier; no name or proximity heuristics are applied. Within each
/// source the first occurrence of an id is kept.
pub fn merge_stations(internal: Vec<Station>, external: Vec<Station>) -> Vec<Station> {
    let mut seen: HashSet<String> = HashSet::with_capacity(internal.len() * 2 + external.len());
    let mut merged = Vec::with_capacity(internal.len() + external.len());

    for station in internal {
        if seen.contains(&station.id) {
            continue;
        }
        seen.extend(station.dedupe_keys().map(str::to_string));
        merged.push(station);
    }

    for station in external {
        if seen.insert(station.id.clone()) {
            merged.push(station);
        }
    }

    merged
}

pub fn sort_by_distance(stations: &mut [Station], origin: Coordinates) {
    for station in stations.iter_mut() {
        station.distance_m = Some(haversine_distance_m(origin, station.location));
    }
    stations.sort_by(|a, b| {
        a.distance_m
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance_m.unwrap_or(f64::MAX))
    });
}
