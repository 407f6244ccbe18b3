use std::collections::HashSet;

use actix_web::web;
use thiserror::Error;

use crate::adapters::places::{HttpPlacesClient, PlacesError};
use crate::app::services::{ServiceError, SqliteStationService, StationQueryHandler};
use crate::domain::geo::{BoundingBox, haversine_distance_m};
use crate::domain::location::LocationResolver;
use crate::domain::models::{Coordinates, Station};
use crate::domain::payloads::{DataSource, NearbyQuery, NearbyResponse};
use crate::domain::station_merge::{merge_stations, sort_by_distance};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("station store query failed: {0}")]
    Store(#[from] ServiceError),
    #[error("station store query was interrupted: {0}")]
    Blocking(String),
    #[error("places search failed: {0}")]
    Places(#[from] PlacesError),
}

/// Aggregates the internal store and the external places API into one list.
#[derive(Clone)]
pub struct StationSearch {
    stations: SqliteStationService,
    places: Option<HttpPlacesClient>,
    resolver: LocationResolver,
    default_radius_m: u32,
    max_radius_m: u32,
}

impl StationSearch {
    pub fn new(
        stations: SqliteStationService,
        places: Option<HttpPlacesClient>,
        resolver: LocationResolver,
        default_radius_m: u32,
        max_radius_m: u32,
    ) -> Self {
        Self {
            stations,
            places,
            resolver,
            default_radius_m,
            max_radius_m: max_radius_m.max(1),
        }
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn radius_for(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_radius_m)
            .clamp(1, self.max_radius_m)
    }

    /// Both sources are queried concurrently. A failing source contributes no
    /// stations and is listed in `degraded_sources`; the search itself never fails.
    pub async fn search(&self, query: NearbyQuery) -> NearbyResponse {
        let origin = self.resolver.resolve_optional(query.lat, query.lng);
        let radius_m = self.radius_for(query.radius);
        let keyword = query
            .keyword
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let (internal, external) = tokio::join!(
            self.internal_stations(origin.coordinates, radius_m, keyword.clone()),
            self.external_stations(origin.coordinates, radius_m, keyword.as_deref()),
        );

        let mut degraded_sources = Vec::new();

        let mut internal = internal.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "internal station source failed, continuing without it");
            degraded_sources.push(DataSource::Internal);
            Vec::new()
        });

        let external = match external {
            Ok(Some(stations)) => stations,
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(error = %error, "external station source failed, continuing without it");
                degraded_sources.push(DataSource::External);
                Vec::new()
            }
        };

        if !degraded_sources.contains(&DataSource::Internal) {
            match self.linked_outside_results(&internal, &external).await {
                Ok(linked) => internal.extend(linked),
                Err(error) => {
                    tracing::warn!(error = %error, "linked station lookup failed, keeping external entries");
                }
            }
        }

        let internal_count = internal.len();
        let external_count = external.len();
        let mut stations = merge_stations(internal, external);
        sort_by_distance(&mut stations, origin.coordinates);

        tracing::debug!(
            lat = origin.coordinates.lat,
            lng = origin.coordinates.lng,
            radius_m,
            internal_count,
            external_count,
            merged_count = stations.len(),
            "nearby search completed"
        );

        NearbyResponse {
            origin,
            radius_m,
            stations,
            degraded_sources,
        }
    }

    async fn internal_stations(
        &self,
        center: Coordinates,
        radius_m: u32,
        keyword: Option<String>,
    ) -> Result<Vec<Station>, SearchError> {
        let service = self.stations.clone();
        let bounds = BoundingBox::around(center, f64::from(radius_m));

        let stations = web::block(move || {
            service.list_stations_in_bounds(&bounds, keyword.as_deref())
        })
        .await
        .map_err(|error| SearchError::Blocking(error.to_string()))??;

        // The bounding box over-selects at the corners.
        Ok(stations
            .into_iter()
            .filter(|station| haversine_distance_m(center, station.location) <= f64::from(radius_m))
            .collect())
    }

    /// Internal records linked to external results that the radius query
    /// missed, so a linked place never surfaces as its external copy.
    async fn linked_outside_results(
        &self,
        internal: &[Station],
        external: &[Station],
    ) -> Result<Vec<Station>, SearchError> {
        let known: HashSet<&str> = internal.iter().flat_map(Station::dedupe_keys).collect();
        let place_ids: Vec<String> = external
            .iter()
            .map(|station| station.id.as_str())
            .filter(|id| !known.contains(id))
            .map(ToString::to_string)
            .collect();
        if place_ids.is_empty() {
            return Ok(Vec::new());
        }

        let service = self.stations.clone();
        let linked = web::block(move || {
            let mut linked: Vec<Station> = Vec::new();
            for place_id in &place_ids {
                let Some(station_id) = service.find_station_by_place_id(place_id)? else {
                    continue;
                };
                if linked.iter().any(|station| station.id == station_id) {
                    continue;
                }
                if let Some(station) = service.get_station(&station_id)? {
                    linked.push(station);
                }
            }
            Ok::<_, ServiceError>(linked)
        })
        .await
        .map_err(|error| SearchError::Blocking(error.to_string()))??;

        Ok(linked)
    }

    async fn external_stations(
        &self,
        center: Coordinates,
        radius_m: u32,
        keyword: Option<&str>,
    ) -> Result<Option<Vec<Station>>, SearchError> {
        let Some(places) = &self.places else {
            return Ok(None);
        };
        let stations = places.nearby_search(center, radius_m, keyword).await?;
        Ok(Some(stations))
    }
}
