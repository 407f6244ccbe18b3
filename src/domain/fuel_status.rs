use crate::domain::models::{FuelKind, FuelStatus, NewReport, QueueLength, Report, Station};

/// Price and queue length only carry meaning while the fuel is available.
pub fn normalize(mut status: FuelStatus) -> FuelStatus {
    if !status.available {
        status.price = None;
        status.queue_length = QueueLength::None;
    }
    status
}

pub fn normalize_report(mut report: NewReport) -> NewReport {
    if !report.available {
        report.price = None;
        report.queue_length = QueueLength::None;
    }
    report.comment = report
        .comment
        .map(|comment| comment.trim().to_string())
        .filter(|comment| !comment.is_empty());
    report
}

pub fn status_from_report(report: &Report) -> FuelStatus {
    normalize(FuelStatus {
        fuel_kind: report.fuel_kind,
        available: report.available,
        price: report.price,
        queue_length: report.queue_length,
        last_updated: Some(report.submitted_at.clone()),
    })
}

/// Folds a report into the station's status for its fuel kind. Last write wins.
pub fn apply_report(station: &mut Station, report: &Report) {
    let status = status_from_report(report);

    match station
        .fuel_statuses
        .iter_mut()
        .find(|existing| existing.fuel_kind == report.fuel_kind)
    {
        Some(existing) => *existing = status,
        None => {
            station.fuel_statuses.push(status);
            station.fuel_statuses.sort_by_key(|status| status.fuel_kind);
        }
    }
}

/// One entry per fuel kind, in `FuelKind::ALL` order, missing kinds as unknown.
pub fn complete_statuses(statuses: Vec<FuelStatus>) -> Vec<FuelStatus> {
    FuelKind::ALL
        .into_iter()
        .map(|kind| {
            statuses
                .iter()
                .find(|status| status.fuel_kind == kind)
                .cloned()
                .map(normalize)
                .unwrap_or_else(|| FuelStatus::unknown(kind))
        })
        .collect()
}
