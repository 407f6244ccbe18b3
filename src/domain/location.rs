use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::Coordinates;

pub const DEFAULT_FALLBACK: Coordinates = Coordinates {
    lat: 6.9271,
    lng: 79.8612,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("geolocation permission denied")]
    PermissionDenied,
    #[error("geolocation unavailable: {0}")]
    Unavailable(String),
    #[error("geolocation timed out")]
    Timeout,
    #[error("address could not be resolved: {0}")]
    AddressNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Device,
    Manual,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub source: LocationSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    Device(Result<Coordinates, LocationError>),
    Manual(Result<Coordinates, LocationError>),
}

#[derive(Debug, Clone, Copy)]
pub struct LocationResolver {
    fallback: Coordinates,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK)
    }
}

impl LocationResolver {
    pub fn new(fallback: Coordinates) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> ResolvedLocation {
        ResolvedLocation {
            coordinates: self.fallback,
            source: LocationSource::Fallback,
        }
    }

    /// Never fails: any error or out-of-range reading resolves to the fallback.
    pub fn resolve(&self, outcome: LocationOutcome) -> ResolvedLocation {
        let (result, source) = match outcome {
            LocationOutcome::Device(result) => (result, LocationSource::Device),
            LocationOutcome::Manual(result) => (result, LocationSource::Manual),
        };

        match result.map(|coords| Coordinates::new(coords.lat, coords.lng)) {
            Ok(Ok(coordinates)) => ResolvedLocation {
                coordinates,
                source,
            },
            Ok(Err(error)) => {
                tracing::warn!(error = %error, ?source, "discarding invalid coordinates");
                self.fallback()
            }
            Err(error) => {
                tracing::info!(error = %error, ?source, "location unavailable, using fallback");
                self.fallback()
            }
        }
    }

    pub fn resolve_optional(&self, lat: Option<f64>, lng: Option<f64>) -> ResolvedLocation {
        match (lat, lng) {
            (Some(lat), Some(lng)) => {
                self.resolve(LocationOutcome::Manual(Ok(Coordinates { lat, lng })))
            }
            _ => self.fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_FALLBACK, LocationError, LocationOutcome, LocationResolver, LocationSource,
    };
    use crate::domain::models::Coordinates;

    #[test]
    fn uses_device_coordinates_when_available() {
        let resolver = LocationResolver::default();
        let resolved = resolver.resolve(LocationOutcome::Device(Ok(Coordinates {
            lat: 7.2906,
            lng: 80.6337,
        })));

        assert_eq!(resolved.source, LocationSource::Device);
        assert_eq!(resolved.coordinates.lat, 7.2906);
    }

    #[test]
    fn falls_back_when_geolocation_fails() {
        let resolver = LocationResolver::default();

        for error in [
            LocationError::PermissionDenied,
            LocationError::Timeout,
            LocationError::Unavailable("no gps".to_string()),
        ] {
            let resolved = resolver.resolve(LocationOutcome::Device(Err(error)));
            assert_eq!(resolved.source, LocationSource::Fallback);
            assert_eq!(resolved.coordinates, DEFAULT_FALLBACK);
        }
    }

    #[test]
    fn falls_back_on_out_of_range_coordinates() {
        let resolver = LocationResolver::new(Coordinates { lat: 1.0, lng: 2.0 });
        let resolved = resolver.resolve(LocationOutcome::Manual(Ok(Coordinates {
            lat: 123.0,
            lng: 0.0,
        })));

        assert_eq!(resolved.source, LocationSource::Fallback);
        assert_eq!(resolved.coordinates, Coordinates { lat: 1.0, lng: 2.0 });
    }

    #[test]
    fn missing_query_coordinates_use_fallback() {
        let resolver = LocationResolver::default();

        assert_eq!(
            resolver.resolve_optional(Some(7.0), None).source,
            LocationSource::Fallback
        );
        assert_eq!(
            resolver.resolve_optional(Some(7.0), Some(80.0)).source,
            LocationSource::Manual
        );
    }
}
