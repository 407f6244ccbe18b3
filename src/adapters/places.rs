use serde::Deserialize;
use thiserror::Error;

use crate::domain::fuel_status::complete_statuses;
use crate::domain::models::{Brand, Coordinates, Station, StationSource};

const NEARBY_PLACE_TYPE: &str = "gas_station";
const DETAILS_FIELDS: &str = "place_id,name,formatted_address,geometry,opening_hours";

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("places request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("places api returned status {status}: {message}")]
    Upstream { status: String, message: String },
    #[error("place not found: {0}")]
    NotFound(String),
    #[error("places api returned a result without coordinates")]
    MissingGeometry,
}

#[derive(Debug, Clone)]
pub struct HttpPlacesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    result: Option<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    candidates: Vec<PlaceCandidate>,
}

#[derive(Debug, Deserialize)]
struct PlaceCandidate {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    place_id: String,
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    opening_hours: Option<OpeningHours>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    weekday_text: Vec<String>,
}

impl HttpPlacesClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, PlacesError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn nearby_search(
        &self,
        origin: Coordinates,
        radius_m: u32,
        keyword: Option<&str>,
    ) -> Result<Vec<Station>, PlacesError> {
        let location = format!("{},{}", origin.lat, origin.lng);
        let radius = radius_m.to_string();
        let mut query = vec![
            ("location", location.as_str()),
            ("radius", radius.as_str()),
            ("type", NEARBY_PLACE_TYPE),
            ("key", self.api_key.as_str()),
        ];
        if let Some(keyword) = keyword.map(str::trim).filter(|value| !value.is_empty()) {
            query.push(("keyword", keyword));
        }

        let response: NearbyResponse = self
            .http
            .get(format!("{}/nearbysearch/json", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        ensure_ok(&response.status, response.error_message)?;

        let mut stations = Vec::with_capacity(response.results.len());
        for result in response.results {
            match station_from_place(result) {
                Ok(station) => stations.push(station),
                Err(error) => tracing::debug!(error = %error, "skipping place without geometry"),
            }
        }
        Ok(stations)
    }

    pub async fn place_details(&self, place_id: &str) -> Result<Station, PlacesError> {
        let response: DetailsResponse = self
            .http
            .get(format!("{}/details/json", self.base_url))
            .query(&[
                ("place_id", place_id),
                ("fields", DETAILS_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if matches!(response.status.as_str(), "NOT_FOUND" | "INVALID_REQUEST") {
            return Err(PlacesError::NotFound(place_id.to_string()));
        }
        ensure_ok(&response.status, response.error_message)?;

        let result = response
            .result
            .ok_or_else(|| PlacesError::NotFound(place_id.to_string()))?;
        station_from_place(result)
    }

    /// Resolves a free-text address to coordinates; `None` when nothing matched.
    pub async fn find_place(&self, text: &str) -> Result<Option<Coordinates>, PlacesError> {
        let response: FindPlaceResponse = self
            .http
            .get(format!("{}/findplacefromtext/json", self.base_url))
            .query(&[
                ("input", text),
                ("inputtype", "textquery"),
                ("fields", "geometry"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        ensure_ok(&response.status, response.error_message)?;

        Ok(response
            .candidates
            .into_iter()
            .find_map(|candidate| candidate.geometry)
            .map(|geometry| Coordinates {
                lat: geometry.location.lat,
                lng: geometry.location.lng,
            }))
    }
}

fn ensure_ok(status: &str, message: Option<String>) -> Result<(), PlacesError> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(PlacesError::Upstream {
            status: other.to_string(),
            message: message.unwrap_or_default(),
        }),
    }
}

fn station_from_place(place: PlaceResult) -> Result<Station, PlacesError> {
    let geometry = place.geometry.ok_or(PlacesError::MissingGeometry)?;
    let opening_hours = place
        .opening_hours
        .map(|hours| hours.weekday_text.join("; "))
        .filter(|text| !text.is_empty());

    Ok(Station {
        brand: Brand::from_place_name(&place.name),
        id: place.place_id.clone(),
        name: place.name,
        location: Coordinates {
            lat: geometry.location.lat,
            lng: geometry.location.lng,
        },
        address: place.formatted_address.or(place.vicinity),
        opening_hours,
        fuel_statuses: complete_statuses(Vec::new()),
        source: StationSource::External,
        place_id: Some(place.place_id),
        is_linked: false,
        distance_m: None,
    })
}
