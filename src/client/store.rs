use std::collections::BTreeSet;

use crate::client::report_form::{ReportDraft, ReportValidationError};
use crate::domain::fuel_status::apply_report;
use crate::domain::location::ResolvedLocation;
use crate::domain::models::{Brand, FuelKind, NewReport, SessionUser, Station, StationSource};
use crate::domain::payloads::{
    DataSource, FavoriteResponse, LinkResponse, NearbyQuery, NearbyResponse, ReportResponse,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AsyncStatus {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

impl AsyncStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, AsyncStatus::Loading)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationFilters {
    pub fuel_kind: Option<FuelKind>,
    pub brand: Option<Brand>,
    pub available_only: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationState {
    pub stations: Vec<Station>,
    pub selected_station_id: Option<String>,
    pub favorite_station_ids: BTreeSet<String>,
    pub filters: StationFilters,
    pub location: Option<ResolvedLocation>,
    pub session: SessionUser,
    pub search_status: AsyncStatus,
    pub link_status: AsyncStatus,
    pub report_status: AsyncStatus,
    pub favorite_status: AsyncStatus,
    pub report_form_error: Option<ReportValidationError>,
    pub degraded_sources: Vec<DataSource>,
    pub auth_redirect: bool,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    LocationResolved(ResolvedLocation),
    SearchRequested {
        radius: Option<u32>,
        keyword: Option<String>,
    },
    SearchSucceeded(NearbyResponse),
    SearchFailed(String),
    StationSelected(Option<String>),
    FiltersChanged(StationFilters),
    LinkRequested {
        place_id: String,
    },
    StationLinked(LinkResponse),
    LinkFailed(String),
    ReportSubmitted(ReportDraft),
    ReportPersisted(ReportResponse),
    ReportRejected(String),
    ReportFailed(String),
    FavoriteRequested {
        station_id: String,
    },
    FavoriteSaved(FavoriteResponse),
    FavoriteFailed(String),
    AuthenticationRequired,
    QueuedOffline {
        reason: String,
    },
    SessionChanged(SessionUser),
    SignedOut,
    MessagesDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchStations(NearbyQuery),
    LinkStation {
        place_id: String,
    },
    SubmitReport {
        station_id: String,
        user_id: String,
        report: NewReport,
        link_first: bool,
    },
    AddFavorite {
        station_id: String,
        user_id: String,
        link_first: bool,
    },
}

/// Single owner of `StationState`; every change goes through `dispatch`.
#[derive(Debug, Default)]
pub struct Store {
    state: StationState,
}

impl Store {
    pub fn new(state: StationState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        reduce(&mut self.state, action)
    }

    pub fn visible_stations(&self) -> Vec<&Station> {
        visible_stations(&self.state)
    }
}

pub fn reduce(state: &mut StationState, action: Action) -> Vec<Effect> {
    match action {
        Action::LocationResolved(location) => {
            state.location = Some(location);
            Vec::new()
        }
        Action::SearchRequested { radius, keyword } => {
            state.search_status = AsyncStatus::Loading;
            let coordinates = state.location.map(|location| location.coordinates);
            vec![Effect::FetchStations(NearbyQuery {
                lat: coordinates.map(|c| c.lat),
                lng: coordinates.map(|c| c.lng),
                radius,
                keyword,
            })]
        }
        Action::SearchSucceeded(response) => {
            state.search_status = AsyncStatus::Idle;
            if state.location.is_none() {
                state.location = Some(response.origin);
            }
            state.stations = response.stations;
            state.degraded_sources = response.degraded_sources;
            if let Some(selected) = &state.selected_station_id
                && !state.stations.iter().any(|station| &station.id == selected)
            {
                state.selected_station_id = None;
            }
            Vec::new()
        }
        Action::SearchFailed(message) => {
            state.search_status = AsyncStatus::Failed(message.clone());
            state.messages.push(message);
            Vec::new()
        }
        Action::StationSelected(station_id) => {
            state.selected_station_id = station_id;
            Vec::new()
        }
        Action::FiltersChanged(filters) => {
            state.filters = filters;
            Vec::new()
        }
        Action::LinkRequested { place_id } => {
            if !needs_link(state, &place_id) {
                return Vec::new();
            }
            state.link_status = AsyncStatus::Loading;
            vec![Effect::LinkStation { place_id }]
        }
        Action::StationLinked(link) => {
            state.link_status = AsyncStatus::Idle;
            rewrite_linked_station(state, &link);
            Vec::new()
        }
        Action::LinkFailed(message) => {
            state.link_status = AsyncStatus::Failed(message.clone());
            state.messages.push(message);
            Vec::new()
        }
        Action::ReportSubmitted(draft) => {
            let Some(user_id) = state.session.authenticated_id().map(ToString::to_string) else {
                state.auth_redirect = true;
                return Vec::new();
            };

            match draft.validate() {
                Ok((station_id, report)) => {
                    state.report_form_error = None;
                    state.report_status = AsyncStatus::Loading;
                    let link_first = needs_link(state, &station_id);
                    vec![Effect::SubmitReport {
                        station_id,
                        user_id,
                        report,
                        link_first,
                    }]
                }
                Err(error) => {
                    state.report_form_error = Some(error);
                    Vec::new()
                }
            }
        }
        Action::ReportPersisted(response) => {
            state.report_status = AsyncStatus::Idle;
            if let Some(station) = state
                .stations
                .iter_mut()
                .find(|station| station.id == response.report.station_id)
            {
                apply_report(station, &response.report);
            }
            Vec::new()
        }
        Action::ReportRejected(message) => {
            state.report_status = AsyncStatus::Failed(message.clone());
            Vec::new()
        }
        Action::ReportFailed(message) => {
            state.report_status = AsyncStatus::Failed(message.clone());
            state.messages.push(message);
            Vec::new()
        }
        Action::FavoriteRequested { station_id } => {
            let Some(user_id) = state.session.authenticated_id().map(ToString::to_string) else {
                state.auth_redirect = true;
                return Vec::new();
            };
            state.favorite_status = AsyncStatus::Loading;
            let link_first = needs_link(state, &station_id);
            vec![Effect::AddFavorite {
                station_id,
                user_id,
                link_first,
            }]
        }
        Action::FavoriteSaved(response) => {
            state.favorite_status = AsyncStatus::Idle;
            state.favorite_station_ids.insert(response.station_id);
            Vec::new()
        }
        Action::FavoriteFailed(message) => {
            state.favorite_status = AsyncStatus::Failed(message.clone());
            state.messages.push(message);
            Vec::new()
        }
        Action::AuthenticationRequired => {
            state.auth_redirect = true;
            clear_loading(state);
            Vec::new()
        }
        Action::QueuedOffline { reason } => {
            clear_loading(state);
            state
                .messages
                .push(format!("offline, will retry when connected: {reason}"));
            Vec::new()
        }
        Action::SessionChanged(session) => {
            state.auth_redirect = false;
            state.session = session;
            Vec::new()
        }
        Action::SignedOut => {
            state.session = SessionUser::default();
            state.favorite_station_ids.clear();
            Vec::new()
        }
        Action::MessagesDismissed => {
            state.messages.clear();
            Vec::new()
        }
    }
}

pub fn visible_stations(state: &StationState) -> Vec<&Station> {
    let filters = &state.filters;

    state
        .stations
        .iter()
        .filter(|station| filters.brand.is_none_or(|brand| station.brand == brand))
        .filter(|station| {
            if !filters.available_only {
                return true;
            }
            match filters.fuel_kind {
                Some(kind) => station
                    .fuel_status(kind)
                    .is_some_and(|status| status.available),
                None => station.fuel_statuses.iter().any(|status| status.available),
            }
        })
        .collect()
}

pub fn selected_station(state: &StationState) -> Option<&Station> {
    let selected = state.selected_station_id.as_deref()?;
    state.stations.iter().find(|station| station.id == selected)
}

fn needs_link(state: &StationState, station_id: &str) -> bool {
    state
        .stations
        .iter()
        .any(|station| station.id == station_id && station.source == StationSource::External)
}

/// Rewrites the external station carrying `place_id` to its internal id. Only the
/// first matching entry is rewritten; once rewritten it no longer matches.
fn rewrite_linked_station(state: &mut StationState, link: &LinkResponse) {
    let Some(index) = state.stations.iter().position(|station| {
        station.id == link.place_id && station.source == StationSource::External
    }) else {
        return;
    };

    if state
        .stations
        .iter()
        .any(|station| station.id == link.station_id)
    {
        state.stations.remove(index);
    } else {
        let station = &mut state.stations[index];
        station.id = link.station_id.clone();
        station.source = StationSource::Internal;
        station.place_id = Some(link.place_id.clone());
        station.is_linked = true;
    }

    if state.selected_station_id.as_deref() == Some(link.place_id.as_str()) {
        state.selected_station_id = Some(link.station_id.clone());
    }
    if state.favorite_station_ids.remove(&link.place_id) {
        state.favorite_station_ids.insert(link.station_id.clone());
    }
}

fn clear_loading(state: &mut StationState) {
    for status in [
        &mut state.search_status,
        &mut state.link_status,
        &mut state.report_status,
        &mut state.favorite_status,
    ] {
        if status.is_loading() {
            *status = AsyncStatus::Idle;
        }
    }
}
