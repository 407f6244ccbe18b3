use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};

use crate::adapters::db::{DbError, NewStationRecord};
use crate::adapters::places::{HttpPlacesClient, PlacesError};
use crate::adapters::price_feed::HttpPriceFeed;
use crate::app::refresh::apply_entries;
use crate::app::search::StationSearch;
use crate::app::services::{
    ServiceError, SqliteStationService, StationCommandHandler, StationQueryHandler,
};
use crate::client::report_form::validate_report;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::location::{LocationError, LocationOutcome};
use crate::domain::models::NewReport;
use crate::domain::payloads::{
    ErrorBody, FavoriteRequest, FavoriteResponse, LinkRequest, LinkResponse, NearbyQuery,
    ReportResponse,
};

pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Clone)]
pub struct ApiState {
    pub stations: SqliteStationService,
    pub search: StationSearch,
    pub places: Option<HttpPlacesClient>,
    pub price_feed: Option<HttpPriceFeed>,
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsDbResponse {
    pub schema_version: u32,
    pub stations_count: i64,
    pub linked_stations_count: i64,
    pub reports_count: i64,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(health)
        .service(nearby_stations_endpoint)
        .service(link_station_endpoint)
        .service(get_station_endpoint)
        .service(list_reports_endpoint)
        .service(submit_report_endpoint)
        .service(place_details_endpoint)
        .service(geocode_endpoint)
        .service(add_favorite_endpoint)
        .service(list_favorites_endpoint)
        .service(refresh_prices_endpoint)
        .service(get_db_diagnostics_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/stations/nearby")]
async fn nearby_stations_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<NearbyQuery>,
) -> impl Responder {
    let response = state.search.search(query.into_inner()).await;
    HttpResponse::Ok().json(response)
}

#[post("/stations/link")]
async fn link_station_endpoint(
    state: web::Data<ApiState>,
    body: web::Json<LinkRequest>,
) -> impl Responder {
    let place_id = body.place_id.trim();
    if place_id.is_empty() {
        return error_response(HttpResponse::BadRequest(), "placeId is required");
    }

    match state.stations.find_station_by_place_id(place_id) {
        Ok(Some(station_id)) => {
            return HttpResponse::Ok().json(LinkResponse {
                place_id: place_id.to_string(),
                station_id,
                already_linked: true,
            });
        }
        Ok(None) => {}
        Err(error) => return service_error_response(error),
    }

    let Some(places) = &state.places else {
        return error_response(HttpResponse::BadGateway(), "places api is not configured");
    };
    let place = match places.place_details(place_id).await {
        Ok(place) => place,
        Err(error) => return places_error_response(error),
    };

    let record = NewStationRecord {
        name: place.name,
        brand: place.brand,
        location: place.location,
        address: place.address,
        opening_hours: place.opening_hours,
        place_id: Some(place_id.to_string()),
        created_at: SystemClock.now().to_iso8601(),
    };

    match state.stations.link_place(&record) {
        Ok(outcome) => {
            tracing::info!(
                place_id,
                station_id = %outcome.station_id,
                already_linked = outcome.already_linked,
                "place linked to internal station"
            );
            HttpResponse::Ok().json(LinkResponse {
                place_id: place_id.to_string(),
                station_id: outcome.station_id,
                already_linked: outcome.already_linked,
            })
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/stations/{station_id}")]
async fn get_station_endpoint(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> impl Responder {
    let station_id = path.into_inner();
    match state.stations.get_station(&station_id) {
        Ok(Some(station)) => HttpResponse::Ok().json(station),
        Ok(None) => station_not_found(&station_id),
        Err(error) => service_error_response(error),
    }
}

#[get("/stations/{station_id}/reports")]
async fn list_reports_endpoint(
    state: web::Data<ApiState>,
    path: web::Path<String>,
    query: web::Query<ReportsQuery>,
) -> impl Responder {
    let station_id = path.into_inner();
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    match state.stations.get_station(&station_id) {
        Ok(Some(_)) => {}
        Ok(None) => return station_not_found(&station_id),
        Err(error) => return service_error_response(error),
    }

    match state.stations.list_reports(&station_id, limit) {
        Ok(reports) => HttpResponse::Ok().json(reports),
        Err(error) => service_error_response(error),
    }
}

#[post("/stations/{station_id}/reports")]
async fn submit_report_endpoint(
    state: web::Data<ApiState>,
    request: HttpRequest,
    path: web::Path<String>,
    body: web::Json<NewReport>,
) -> impl Responder {
    let user_id = match require_user(&request) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let station_id = path.into_inner();

    let report = match validate_report(body.into_inner()) {
        Ok(report) => report,
        Err(error) => return error_response(HttpResponse::BadRequest(), error.to_string()),
    };

    let submitted_at = SystemClock.now().to_iso8601();
    let report = match state
        .stations
        .insert_report(&station_id, Some(&user_id), &report, &submitted_at)
    {
        Ok(report) => report,
        Err(error) => return service_error_response(error),
    };

    tracing::info!(
        station_id = %report.station_id,
        report_id = %report.id,
        fuel_kind = %report.fuel_kind,
        available = report.available,
        "fuel report persisted"
    );

    match state.stations.get_station(&station_id) {
        Ok(Some(station)) => HttpResponse::Created().json(ReportResponse { report, station }),
        Ok(None) => station_not_found(&station_id),
        Err(error) => service_error_response(error),
    }
}

#[get("/places/{place_id}")]
async fn place_details_endpoint(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> impl Responder {
    let Some(places) = &state.places else {
        return error_response(HttpResponse::BadGateway(), "places api is not configured");
    };

    match places.place_details(&path.into_inner()).await {
        Ok(place) => HttpResponse::Ok().json(place),
        Err(error) => places_error_response(error),
    }
}

#[get("/locations/geocode")]
async fn geocode_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<GeocodeQuery>,
) -> impl Responder {
    let Some(address) = query
        .address
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return error_response(HttpResponse::BadRequest(), "address is required");
    };

    let lookup = match &state.places {
        Some(places) => match places.find_place(address).await {
            Ok(Some(coordinates)) => Ok(coordinates),
            Ok(None) => Err(LocationError::AddressNotFound(address.to_string())),
            Err(error) => Err(LocationError::Unavailable(error.to_string())),
        },
        None => Err(LocationError::Unavailable(
            "places api is not configured".to_string(),
        )),
    };

    let resolved = state.search.resolver().resolve(LocationOutcome::Manual(lookup));
    HttpResponse::Ok().json(resolved)
}

#[post("/favorites")]
async fn add_favorite_endpoint(
    state: web::Data<ApiState>,
    request: HttpRequest,
    body: web::Json<FavoriteRequest>,
) -> impl Responder {
    let user_id = match require_user(&request) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let created_at = SystemClock.now().to_iso8601();
    match state
        .stations
        .add_favorite(&user_id, &body.station_id, &created_at)
    {
        Ok(created) => {
            let response = FavoriteResponse {
                station_id: body.into_inner().station_id,
                created,
            };
            if created {
                HttpResponse::Created().json(response)
            } else {
                HttpResponse::Ok().json(response)
            }
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/favorites")]
async fn list_favorites_endpoint(
    state: web::Data<ApiState>,
    request: HttpRequest,
) -> impl Responder {
    let user_id = match require_user(&request) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match state.stations.list_favorites(&user_id) {
        Ok(stations) => HttpResponse::Ok().json(stations),
        Err(error) => service_error_response(error),
    }
}

#[post("/jobs/refresh-prices")]
async fn refresh_prices_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let Some(feed) = &state.price_feed else {
        return error_response(HttpResponse::BadGateway(), "price feed is not configured");
    };

    let entries = match feed.fetch_entries().await {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(error = %error, "price feed fetch failed");
            return error_response(HttpResponse::BadGateway(), error.to_string());
        }
    };

    let stations = state.stations.clone();
    match web::block(move || apply_entries(&stations, &entries)).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(error) => error_response(HttpResponse::InternalServerError(), error.to_string()),
    }
}

#[get("/diagnostics/db")]
async fn get_db_diagnostics_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let schema_version = match state.stations.get_schema_version() {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };
    let counts = match state.stations.counts() {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };

    HttpResponse::Ok().json(DiagnosticsDbResponse {
        schema_version,
        stations_count: counts.stations,
        linked_stations_count: counts.linked_stations,
        reports_count: counts.reports,
    })
}

fn require_user(request: &HttpRequest) -> Result<String, HttpResponse> {
    request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| error_response(HttpResponse::Unauthorized(), "authentication required"))
}

fn error_response(
    mut builder: actix_web::HttpResponseBuilder,
    message: impl Into<String>,
) -> HttpResponse {
    builder.json(ErrorBody {
        error: message.into(),
    })
}

fn station_not_found(station_id: &str) -> HttpResponse {
    error_response(
        HttpResponse::NotFound(),
        format!("station not found: {station_id}"),
    )
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match error {
        ServiceError::DbLockPoisoned => {
            error_response(HttpResponse::InternalServerError(), "database lock poisoned")
        }
        ServiceError::Database(DbError::StationNotFound(station_id)) => {
            station_not_found(&station_id)
        }
        ServiceError::Database(error) => error_response(
            HttpResponse::InternalServerError(),
            format!("database query failed: {error}"),
        ),
    }
}

fn places_error_response(error: PlacesError) -> HttpResponse {
    match error {
        PlacesError::NotFound(place_id) => error_response(
            HttpResponse::NotFound(),
            format!("place not found: {place_id}"),
        ),
        other => {
            tracing::warn!(error = %other, "places api request failed");
            error_response(HttpResponse::BadGateway(), other.to_string())
        }
    }
}

fn json_error_handler(error: JsonPayloadError, _request: &HttpRequest) -> actix_web::Error {
    let response = error_response(HttpResponse::BadRequest(), error.to_string());
    InternalError::from_response(error, response).into()
}

fn query_error_handler(error: QueryPayloadError, _request: &HttpRequest) -> actix_web::Error {
    let response = error_response(HttpResponse::BadRequest(), error.to_string());
    InternalError::from_response(error, response).into()
}
