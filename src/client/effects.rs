use thiserror::Error;

use crate::client::offline_queue::{OfflineQueue, PendingRequest, ReplaySummary, Replayed};
use crate::client::store::{Action, Effect};
use crate::domain::models::NewReport;
use crate::domain::payloads::{
    FavoriteResponse, LinkResponse, NearbyQuery, NearbyResponse, ReportResponse,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("network request failed: {0}")]
    Transport(String),
    #[error("request rejected: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Calls the station API on behalf of the client store.
#[allow(async_fn_in_trait)]
pub trait StationBackend {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<NearbyResponse, BackendError>;
    async fn link_station(&self, place_id: &str) -> Result<LinkResponse, BackendError>;
    async fn submit_report(
        &self,
        station_id: &str,
        user_id: &str,
        report: &NewReport,
    ) -> Result<ReportResponse, BackendError>;
    async fn add_favorite(
        &self,
        station_id: &str,
        user_id: &str,
    ) -> Result<FavoriteResponse, BackendError>;
}

/// Executes store effects and turns their outcomes into follow-up actions.
pub struct EffectRunner<B> {
    backend: B,
    queue: OfflineQueue,
}

impl<B: StationBackend> EffectRunner<B> {
    pub fn new(backend: B, queue: OfflineQueue) -> Self {
        Self { backend, queue }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub async fn run(&mut self, effect: Effect) -> Vec<Action> {
        match effect {
            Effect::FetchStations(query) => match self.backend.search_nearby(&query).await {
                Ok(response) => vec![Action::SearchSucceeded(response)],
                Err(error) => vec![failure_action(error, Action::SearchFailed)],
            },
            Effect::LinkStation { place_id } => match self.backend.link_station(&place_id).await {
                Ok(response) => vec![Action::StationLinked(response)],
                Err(BackendError::Transport(message)) => {
                    self.queue
                        .enqueue(PendingRequest::LinkStation { place_id });
                    vec![Action::QueuedOffline { reason: message }]
                }
                Err(error) => vec![failure_action(error, Action::LinkFailed)],
            },
            Effect::SubmitReport {
                station_id,
                user_id,
                report,
                link_first,
            } => self.submit_report(station_id, user_id, report, link_first).await,
            Effect::AddFavorite {
                station_id,
                user_id,
                link_first,
            } => self.add_favorite(station_id, user_id, link_first).await,
        }
    }

    /// Replays the offline queue and maps every delivered request to an action.
    pub async fn replay_offline(&mut self) -> (ReplaySummary, Vec<Action>) {
        let summary = self.queue.replay(&self.backend).await;

        let actions = summary
            .results
            .iter()
            .cloned()
            .map(|result| match result {
                Replayed::Linked(response) => Action::StationLinked(response),
                Replayed::Reported(response) => Action::ReportPersisted(response),
                Replayed::Favorited(response) => Action::FavoriteSaved(response),
            })
            .collect();

        tracing::info!(
            sent = summary.sent,
            retained = summary.retained,
            dropped = summary.dropped,
            "offline queue replayed"
        );

        (summary, actions)
    }

    async fn submit_report(
        &mut self,
        station_id: String,
        user_id: String,
        report: NewReport,
        link_first: bool,
    ) -> Vec<Action> {
        let (station_id, mut actions) = match self.link_if_needed(station_id, link_first).await {
            Ok(linked) => linked,
            Err(LinkFailure::Offline { place_id, reason }) => {
                self.queue.enqueue(PendingRequest::LinkStation {
                    place_id: place_id.clone(),
                });
                self.queue.enqueue(PendingRequest::SubmitReport {
                    station_id: place_id,
                    user_id,
                    report,
                });
                return vec![Action::QueuedOffline { reason }];
            }
            Err(LinkFailure::Rejected(error)) => {
                return vec![failure_action(error, Action::ReportFailed)];
            }
        };

        match self
            .backend
            .submit_report(&station_id, &user_id, &report)
            .await
        {
            Ok(response) => actions.push(Action::ReportPersisted(response)),
            Err(BackendError::Transport(reason)) => {
                self.queue.enqueue(PendingRequest::SubmitReport {
                    station_id,
                    user_id,
                    report,
                });
                actions.push(Action::QueuedOffline { reason });
            }
            Err(BackendError::Validation(message)) => actions.push(Action::ReportRejected(message)),
            Err(error) => actions.push(failure_action(error, Action::ReportFailed)),
        }

        actions
    }

    async fn add_favorite(
        &mut self,
        station_id: String,
        user_id: String,
        link_first: bool,
    ) -> Vec<Action> {
        let (station_id, mut actions) = match self.link_if_needed(station_id, link_first).await {
            Ok(linked) => linked,
            Err(LinkFailure::Offline { place_id, reason }) => {
                self.queue.enqueue(PendingRequest::LinkStation {
                    place_id: place_id.clone(),
                });
                self.queue.enqueue(PendingRequest::AddFavorite {
                    station_id: place_id,
                    user_id,
                });
                return vec![Action::QueuedOffline { reason }];
            }
            Err(LinkFailure::Rejected(error)) => {
                return vec![failure_action(error, Action::FavoriteFailed)];
            }
        };

        match self.backend.add_favorite(&station_id, &user_id).await {
            Ok(response) => actions.push(Action::FavoriteSaved(response)),
            Err(BackendError::Transport(reason)) => {
                self.queue.enqueue(PendingRequest::AddFavorite {
                    station_id,
                    user_id,
                });
                actions.push(Action::QueuedOffline { reason });
            }
            Err(error) => actions.push(failure_action(error, Action::FavoriteFailed)),
        }

        actions
    }

    async fn link_if_needed(
        &self,
        station_id: String,
        link_first: bool,
    ) -> Result<(String, Vec<Action>), LinkFailure> {
        if !link_first {
            return Ok((station_id, Vec::new()));
        }

        match self.backend.link_station(&station_id).await {
            Ok(response) => Ok((
                response.station_id.clone(),
                vec![Action::StationLinked(response)],
            )),
            Err(BackendError::Transport(reason)) => Err(LinkFailure::Offline {
                place_id: station_id,
                reason,
            }),
            Err(error) => Err(LinkFailure::Rejected(error)),
        }
    }
}

enum LinkFailure {
    Offline { place_id: String, reason: String },
    Rejected(BackendError),
}

fn failure_action(error: BackendError, inline: fn(String) -> Action) -> Action {
    match error {
        BackendError::Unauthorized => Action::AuthenticationRequired,
        other => inline(other.to_string()),
    }
}
