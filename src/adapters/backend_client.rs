use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::adapters::api::USER_ID_HEADER;
use crate::client::effects::{BackendError, StationBackend};
use crate::domain::models::NewReport;
use crate::domain::payloads::{
    ErrorBody, FavoriteRequest, FavoriteResponse, LinkRequest, LinkResponse, NearbyQuery,
    NearbyResponse, ReportResponse,
};

/// HTTP client for the station API, used by the client effect runner.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| BackendError::Transport(error.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|error| BackendError::Transport(format!("invalid base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "invalid base url: {base_url}"
            )));
        }
        Ok(Self { http, base_url })
    }

    /// Appends percent-encoded path segments to the base url.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|error| BackendError::Transport(error.to_string()))?;
        decode(response).await
    }
}

impl StationBackend for BackendClient {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<NearbyResponse, BackendError> {
        self.send(self.http.get(self.url(&["stations", "nearby"])).query(query))
            .await
    }

    async fn link_station(&self, place_id: &str) -> Result<LinkResponse, BackendError> {
        self.send(
            self.http
                .post(self.url(&["stations", "link"]))
                .json(&LinkRequest {
                    place_id: place_id.to_string(),
                }),
        )
        .await
    }

    async fn submit_report(
        &self,
        station_id: &str,
        user_id: &str,
        report: &NewReport,
    ) -> Result<ReportResponse, BackendError> {
        self.send(
            self.http
                .post(self.url(&["stations", station_id, "reports"]))
                .header(USER_ID_HEADER, user_id)
                .json(report),
        )
        .await
    }

    async fn add_favorite(
        &self,
        station_id: &str,
        user_id: &str,
    ) -> Result<FavoriteResponse, BackendError> {
        self.send(
            self.http
                .post(self.url(&["favorites"]))
                .header(USER_ID_HEADER, user_id)
                .json(&FavoriteRequest {
                    station_id: station_id.to_string(),
                }),
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|error| BackendError::Decode(error.to_string()));
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(match status {
        StatusCode::BAD_REQUEST => BackendError::Validation(message),
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        other => BackendError::Server {
            status: other.as_u16(),
            message,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{HttpResponse, web};
    use serde_json::json;

    use super::BackendClient;
    use crate::adapters::api::ApiState;
    use crate::adapters::places::HttpPlacesClient;
    use crate::app::search::StationSearch;
    use crate::app::services::SqliteStationService;
    use crate::client::effects::{BackendError, EffectRunner, StationBackend};
    use crate::client::offline_queue::OfflineQueue;
    use crate::client::report_form::ReportDraft;
    use crate::client::store::{Action, AsyncStatus, Store};
    use crate::domain::location::LocationResolver;
    use crate::domain::models::{FuelKind, NewReport, QueueLength, SessionUser, StationSource};
    use crate::domain::payloads::NearbyQuery;
    use crate::test_support::{open_test_connection, spawn_api, spawn_stub};

    async fn nearby() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "status": "OK",
            "results": [{
                "place_id": "ChIJ-ioc",
                "name": "Lanka IOC Wellawatte",
                "geometry": { "location": { "lat": 6.8740, "lng": 79.8600 } }
            }]
        }))
    }

    async fn details() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "status": "OK",
            "result": {
                "place_id": "ChIJ-ioc",
                "name": "Lanka IOC Wellawatte",
                "geometry": { "location": { "lat": 6.8740, "lng": 79.8600 } }
            }
        }))
    }

    fn places_routes(cfg: &mut web::ServiceConfig) {
        cfg.route("/nearbysearch/json", web::get().to(nearby))
            .route("/details/json", web::get().to(details));
    }

    fn spawn_backend(name: &str) -> String {
        let stations = SqliteStationService::new(Arc::new(Mutex::new(open_test_connection(name))));
        let places = HttpPlacesClient::new(&spawn_stub(places_routes), "test-key")
            .expect("places client builds");

        spawn_api(ApiState {
            search: StationSearch::new(
                stations.clone(),
                Some(places.clone()),
                LocationResolver::default(),
                5_000,
                50_000,
            ),
            stations,
            places: Some(places),
            price_feed: None,
        })
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("addr should be available").port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[actix_web::test]
    async fn maps_api_errors_to_backend_errors() {
        let client = BackendClient::new(&spawn_backend("backend-errors")).expect("client builds");
        let report = NewReport {
            fuel_kind: FuelKind::Petrol92,
            available: true,
            price: Some(366.0),
            queue_length: QueueLength::None,
            comment: None,
        };

        let unauthorized = client.submit_report("st-1", " ", &report).await;
        assert_eq!(unauthorized.unwrap_err(), BackendError::Unauthorized);

        let missing = client.submit_report("st-1", "user-1", &report).await;
        assert_eq!(
            missing.unwrap_err(),
            BackendError::NotFound("station not found: st-1".to_string())
        );

        let invalid = client
            .submit_report(
                "st-1",
                "user-1",
                &NewReport {
                    price: Some(0.0),
                    ..report
                },
            )
            .await;
        assert!(matches!(invalid, Err(BackendError::Validation(_))));
    }

    #[test]
    fn station_ids_are_encoded_as_one_path_segment() {
        let client = BackendClient::new("http://127.0.0.1:8080/api/").expect("client builds");

        let url = client.url(&["stations", "a/b?c#d", "reports"]);

        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/api/stations/a%2Fb%3Fc%23d/reports"
        );
        assert!(BackendClient::new("mailto:ops@example.com").is_err());
    }

    #[actix_web::test]
    async fn unreachable_backend_is_a_transport_error() {
        let client = BackendClient::new(&closed_port_url()).expect("client builds");

        let result = client.search_nearby(&NearbyQuery::default()).await;

        assert!(matches!(result, Err(BackendError::Transport(_))));
    }

    #[actix_web::test]
    async fn store_round_trip_against_running_api() {
        let client = BackendClient::new(&spawn_backend("backend-flow")).expect("client builds");
        let mut runner = EffectRunner::new(client, OfflineQueue::default());
        let mut store = Store::default();
        store.dispatch(Action::SessionChanged(SessionUser::authenticated(
            "user-1", "Kumari",
        )));

        let mut pending = store.dispatch(Action::SearchRequested {
            radius: None,
            keyword: None,
        });
        let mut draft = ReportDraft::new(Some("ChIJ-ioc".to_string()), FuelKind::AutoDiesel);
        draft.set_price(Some(356.0));
        draft.set_queue_length(QueueLength::Medium);
        let mut report_sent = false;

        while let Some(effect) = pending.pop() {
            for action in runner.run(effect).await {
                pending.extend(store.dispatch(action));
            }
            if pending.is_empty() && !report_sent {
                report_sent = true;
                pending.extend(store.dispatch(Action::ReportSubmitted(draft.clone())));
            }
        }

        let state = store.state();
        assert_eq!(state.report_status, AsyncStatus::Idle);
        assert!(state.messages.is_empty(), "unexpected messages: {:?}", state.messages);
        let station = state
            .stations
            .iter()
            .find(|station| station.place_id.as_deref() == Some("ChIJ-ioc"))
            .expect("linked station should be listed");
        assert_eq!(station.source, StationSource::Internal);
        assert_ne!(station.id, "ChIJ-ioc");
        let diesel = station
            .fuel_status(FuelKind::AutoDiesel)
            .expect("diesel status should exist");
        assert_eq!(diesel.price, Some(356.0));
        assert!(diesel.last_updated.is_some());
        assert!(runner.queue().is_empty());

        let linked_again = runner
            .backend()
            .link_station("ChIJ-ioc")
            .await
            .expect("relink should succeed");
        assert!(linked_again.already_linked);
        assert_eq!(linked_again.station_id, station.id);
    }
}
