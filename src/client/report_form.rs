use thiserror::Error;

use crate::domain::fuel_status::normalize_report;
use crate::domain::models::{FuelKind, NewReport, QueueLength};

pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportValidationError {
    #[error("a station must be selected")]
    MissingStation,
    #[error("price must be a positive amount")]
    InvalidPrice,
    #[error("comment must be at most {MAX_COMMENT_CHARS} characters")]
    CommentTooLong,
}

/// Editable state of the report form before it is validated into a `NewReport`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    station_id: Option<String>,
    fuel_kind: FuelKind,
    available: bool,
    price: Option<f64>,
    queue_length: QueueLength,
    comment: String,
}

impl ReportDraft {
    pub fn new(station_id: Option<String>, fuel_kind: FuelKind) -> Self {
        Self {
            station_id,
            fuel_kind,
            available: true,
            price: None,
            queue_length: QueueLength::None,
            comment: String::new(),
        }
    }

    pub fn station_id(&self) -> Option<&str> {
        self.station_id.as_deref()
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn queue_length(&self) -> QueueLength {
        self.queue_length
    }

    pub fn set_station(&mut self, station_id: Option<String>) {
        self.station_id = station_id;
    }

    pub fn set_fuel_kind(&mut self, fuel_kind: FuelKind) {
        self.fuel_kind = fuel_kind;
    }

    /// Turning availability off clears the price and resets the queue.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
        if !available {
            self.price = None;
            self.queue_length = QueueLength::None;
        }
    }

    pub fn set_price(&mut self, price: Option<f64>) {
        if self.available {
            self.price = price;
        }
    }

    pub fn set_queue_length(&mut self, queue_length: QueueLength) {
        if self.available {
            self.queue_length = queue_length;
        }
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn validate(&self) -> Result<(String, NewReport), ReportValidationError> {
        let station_id = self
            .station_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ReportValidationError::MissingStation)?;

        let report = validate_report(NewReport {
            fuel_kind: self.fuel_kind,
            available: self.available,
            price: self.price,
            queue_length: self.queue_length,
            comment: Some(self.comment.clone()),
        })?;

        Ok((station_id.to_string(), report))
    }
}

/// Shared by the form and the HTTP endpoint so both reject the same payloads.
pub fn validate_report(report: NewReport) -> Result<NewReport, ReportValidationError> {
    let report = normalize_report(report);

    if let Some(price) = report.price
        && (!price.is_finite() || price <= 0.0)
    {
        return Err(ReportValidationError::InvalidPrice);
    }

    if report
        .comment
        .as_deref()
        .is_some_and(|comment| comment.chars().count() > MAX_COMMENT_CHARS)
    {
        return Err(ReportValidationError::CommentTooLong);
    }

    Ok(report)
}
