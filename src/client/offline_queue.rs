use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::client::effects::{BackendError, StationBackend};
use crate::domain::models::NewReport;
use crate::domain::payloads::{FavoriteResponse, LinkResponse, ReportResponse};

pub const MAX_REPLAY_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingRequest {
    LinkStation {
        place_id: String,
    },
    SubmitReport {
        station_id: String,
        user_id: String,
        report: NewReport,
    },
    AddFavorite {
        station_id: String,
        user_id: String,
    },
}

impl PendingRequest {
    fn rewrite_linked(&mut self, linked: &HashMap<String, String>) {
        match self {
            PendingRequest::SubmitReport { station_id, .. }
            | PendingRequest::AddFavorite { station_id, .. } => {
                if let Some(internal_id) = linked.get(station_id.as_str()) {
                    *station_id = internal_id.clone();
                }
            }
            PendingRequest::LinkStation { .. } => {}
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PendingRequest::LinkStation { .. } => "link_station",
            PendingRequest::SubmitReport { .. } => "submit_report",
            PendingRequest::AddFavorite { .. } => "add_favorite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct QueuedRequest {
    request: PendingRequest,
    attempts: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Replayed {
    Linked(LinkResponse),
    Reported(ReportResponse),
    Favorited(FavoriteResponse),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplaySummary {
    pub sent: usize,
    pub retained: usize,
    pub dropped: usize,
    pub results: Vec<Replayed>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OfflineQueue {
    entries: Vec<QueuedRequest>,
}

impl OfflineQueue {
    pub fn enqueue(&mut self, request: PendingRequest) {
        tracing::debug!(request = request.describe(), "queued request for offline replay");
        self.entries.push(QueuedRequest {
            request,
            attempts: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter().map(|entry| &entry.request)
    }

    /// Replays queued requests in order once connectivity is back.
    ///
    /// Successful requests leave the queue. A failed request stays queued with
    /// one more attempt recorded and is dropped silently after
    /// `MAX_REPLAY_ATTEMPTS`. Requests queued against a place id are rewritten
    /// to the internal id once a link in the same replay succeeds.
    pub async fn replay<B: StationBackend>(&mut self, backend: &B) -> ReplaySummary {
        let mut pending: VecDeque<QueuedRequest> = std::mem::take(&mut self.entries).into();
        let mut linked: HashMap<String, String> = HashMap::new();
        let mut summary = ReplaySummary::default();

        while let Some(mut entry) = pending.pop_front() {
            entry.request.rewrite_linked(&linked);

            match send(backend, &entry.request).await {
                Ok(result) => {
                    if let Replayed::Linked(link) = &result {
                        linked.insert(link.place_id.clone(), link.station_id.clone());
                    }
                    summary.sent += 1;
                    summary.results.push(result);
                }
                Err(error) => {
                    entry.attempts += 1;
                    if entry.attempts >= MAX_REPLAY_ATTEMPTS {
                        tracing::debug!(
                            request = entry.request.describe(),
                            attempts = entry.attempts,
                            error = %error,
                            "dropping request after exhausting replay attempts"
                        );
                        summary.dropped += 1;
                    } else {
                        summary.retained += 1;
                        self.entries.push(entry);
                    }
                }
            }
        }

        summary
    }
}

async fn send<B: StationBackend>(
    backend: &B,
    request: &PendingRequest,
) -> Result<Replayed, BackendError> {
    match request {
        PendingRequest::LinkStation { place_id } => {
            backend.link_station(place_id).await.map(Replayed::Linked)
        }
        PendingRequest::SubmitReport {
            station_id,
            user_id,
            report,
        } => backend
            .submit_report(station_id, user_id, report)
            .await
            .map(Replayed::Reported),
        PendingRequest::AddFavorite {
            station_id,
            user_id,
        } => backend
            .add_favorite(station_id, user_id)
            .await
            .map(Replayed::Favorited),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};

    use super::{MAX_REPLAY_ATTEMPTS, OfflineQueue, PendingRequest, Replayed};
    use crate::client::effects::{BackendError, StationBackend};
    use crate::domain::fuel_status::complete_statuses;
    use crate::domain::location::{LocationSource, ResolvedLocation};
    use crate::domain::models::{
        Brand, Coordinates, FuelKind, NewReport, QueueLength, Report, Station, StationSource,
    };
    use crate::domain::payloads::{
        FavoriteResponse, LinkResponse, NearbyQuery, NearbyResponse, ReportResponse,
    };

    /// Scriptable backend shared by the client tests.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub online: Cell<bool>,
        pub unauthorized: Cell<bool>,
        pub calls: RefCell<Vec<String>>,
        pub stations: RefCell<Vec<Station>>,
    }

    impl FakeBackend {
        pub(crate) fn online() -> Self {
            let backend = Self::default();
            backend.online.set(true);
            backend
        }

        fn check(&self, call: String) -> Result<(), BackendError> {
            self.calls.borrow_mut().push(call);
            if !self.online.get() {
                return Err(BackendError::Transport("connection refused".to_string()));
            }
            if self.unauthorized.get() {
                return Err(BackendError::Unauthorized);
            }
            Ok(())
        }
    }

    pub(crate) fn station(id: &str, source: StationSource) -> Station {
        Station {
            id: id.to_string(),
            name: format!("Station {id}"),
            brand: Brand::Ceypetco,
            location: Coordinates { lat: 6.92, lng: 79.86 },
            address: None,
            opening_hours: None,
            fuel_statuses: complete_statuses(Vec::new()),
            source,
            place_id: match source {
                StationSource::External => Some(id.to_string()),
                StationSource::Internal => None,
            },
            is_linked: false,
            distance_m: None,
        }
    }

    pub(crate) fn internal_id_for(place_id: &str) -> String {
        format!("internal-{place_id}")
    }

    impl StationBackend for FakeBackend {
        async fn search_nearby(&self, query: &NearbyQuery) -> Result<NearbyResponse, BackendError> {
            self.check(format!("search:{:?}", query.keyword))?;
            Ok(NearbyResponse {
                origin: ResolvedLocation {
                    coordinates: Coordinates {
                        lat: query.lat.unwrap_or(6.9271),
                        lng: query.lng.unwrap_or(79.8612),
                    },
                    source: LocationSource::Fallback,
                },
                radius_m: query.radius.unwrap_or(5_000),
                stations: self.stations.borrow().clone(),
                degraded_sources: Vec::new(),
            })
        }

        async fn link_station(&self, place_id: &str) -> Result<LinkResponse, BackendError> {
            self.check(format!("link:{place_id}"))?;
            Ok(LinkResponse {
                place_id: place_id.to_string(),
                station_id: internal_id_for(place_id),
                already_linked: false,
            })
        }

        async fn submit_report(
            &self,
            station_id: &str,
            user_id: &str,
            report: &NewReport,
        ) -> Result<ReportResponse, BackendError> {
            self.check(format!("report:{station_id}"))?;
            if !station_id.starts_with("internal-") && !station_id.starts_with("st-") {
                return Err(BackendError::NotFound(station_id.to_string()));
            }
            let report = Report {
                id: "r-1".to_string(),
                station_id: station_id.to_string(),
                fuel_kind: report.fuel_kind,
                available: report.available,
                price: report.price,
                queue_length: report.queue_length,
                comment: report.comment.clone(),
                user_id: Some(user_id.to_string()),
                submitted_at: "2026-03-01T08:00:00.000Z".to_string(),
            };
            let mut station = station(station_id, StationSource::Internal);
            crate::domain::fuel_status::apply_report(&mut station, &report);
            Ok(ReportResponse { report, station })
        }

        async fn add_favorite(
            &self,
            station_id: &str,
            _user_id: &str,
        ) -> Result<FavoriteResponse, BackendError> {
            self.check(format!("favorite:{station_id}"))?;
            Ok(FavoriteResponse {
                station_id: station_id.to_string(),
                created: true,
            })
        }
    }

    pub(crate) fn diesel_report() -> NewReport {
        NewReport {
            fuel_kind: FuelKind::AutoDiesel,
            available: true,
            price: Some(356.0),
            queue_length: QueueLength::Short,
            comment: None,
        }
    }

    #[actix_web::test]
    async fn replays_queued_requests_when_back_online() {
        let backend = FakeBackend::online();
        let mut queue = OfflineQueue::default();
        queue.enqueue(PendingRequest::SubmitReport {
            station_id: "st-1".to_string(),
            user_id: "user-1".to_string(),
            report: diesel_report(),
        });
        queue.enqueue(PendingRequest::AddFavorite {
            station_id: "st-1".to_string(),
            user_id: "user-1".to_string(),
        });

        let summary = queue.replay(&backend).await;

        assert_eq!(summary.sent, 2);
        assert_eq!(summary.dropped, 0);
        assert!(queue.is_empty());
    }

    #[actix_web::test]
    async fn drops_requests_after_three_failed_attempts() {
        let backend = FakeBackend::default();
        let mut queue = OfflineQueue::default();
        queue.enqueue(PendingRequest::LinkStation {
            place_id: "ChIJ-a".to_string(),
        });

        for attempt in 1..MAX_REPLAY_ATTEMPTS {
            let summary = queue.replay(&backend).await;
            assert_eq!(summary.retained, 1, "attempt {attempt} should retain");
            assert_eq!(queue.len(), 1);
        }

        let summary = queue.replay(&backend).await;
        assert_eq!(summary.dropped, 1);
        assert!(queue.is_empty());
        assert_eq!(backend.calls.borrow().len(), usize::from(MAX_REPLAY_ATTEMPTS));
    }

    #[actix_web::test]
    async fn rewrites_place_ids_after_link_succeeds() {
        let backend = FakeBackend::online();
        let mut queue = OfflineQueue::default();
        queue.enqueue(PendingRequest::LinkStation {
            place_id: "ChIJ-a".to_string(),
        });
        queue.enqueue(PendingRequest::SubmitReport {
            station_id: "ChIJ-a".to_string(),
            user_id: "user-1".to_string(),
            report: diesel_report(),
        });

        let summary = queue.replay(&backend).await;

        assert_eq!(summary.sent, 2);
        assert_eq!(
            backend.calls.borrow().as_slice(),
            ["link:ChIJ-a".to_string(), "report:internal-ChIJ-a".to_string()]
        );
        assert!(matches!(&summary.results[1], Replayed::Reported(response)
            if response.report.station_id == "internal-ChIJ-a"));
    }

    #[test]
    fn survives_a_serde_round_trip() {
        let mut queue = OfflineQueue::default();
        queue.enqueue(PendingRequest::AddFavorite {
            station_id: "st-1".to_string(),
            user_id: "user-1".to_string(),
        });

        let json = serde_json::to_string(&queue).expect("queue should serialize");
        let restored: OfflineQueue = serde_json::from_str(&json).expect("queue should deserialize");

        assert_eq!(restored, queue);
        assert!(json.contains("\"type\":\"add_favorite\""));
    }
}
