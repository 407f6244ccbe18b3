use crate::domain::models::Coordinates;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

pub fn haversine_distance_m(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Degree-aligned box that contains every point within `radius_m` of `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: Coordinates, radius_m: f64) -> Self {
        let d_lat = radius_m / METERS_PER_DEGREE_LAT;
        let cos_lat = center.lat.to_radians().cos().abs().max(1e-6);
        let d_lng = (radius_m / (METERS_PER_DEGREE_LAT * cos_lat)).min(180.0);

        Self {
            min_lat: (center.lat - d_lat).max(-90.0),
            max_lat: (center.lat + d_lat).min(90.0),
            min_lng: (center.lng - d_lng).max(-180.0),
            max_lng: (center.lng + d_lng).min(180.0),
        }
    }
}
