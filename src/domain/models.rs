use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    Petrol92,
    Petrol95,
    AutoDiesel,
    SuperDiesel,
}

impl FuelKind {
    pub const ALL: [FuelKind; 4] = [
        FuelKind::Petrol92,
        FuelKind::Petrol95,
        FuelKind::AutoDiesel,
        FuelKind::SuperDiesel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FuelKind::Petrol92 => "petrol_92",
            FuelKind::Petrol95 => "petrol_95",
            FuelKind::AutoDiesel => "auto_diesel",
            FuelKind::SuperDiesel => "super_diesel",
        }
    }
}

impl fmt::Display for FuelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FuelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "fuel kind",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueLength {
    #[default]
    None,
    Short,
    Medium,
    Long,
}

impl QueueLength {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueLength::None => "none",
            QueueLength::Short => "short",
            QueueLength::Medium => "medium",
            QueueLength::Long => "long",
        }
    }
}

impl FromStr for QueueLength {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(QueueLength::None),
            "short" => Ok(QueueLength::Short),
            "medium" => Ok(QueueLength::Medium),
            "long" => Ok(QueueLength::Long),
            other => Err(UnknownVariant {
                kind: "queue length",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    Ceypetco,
    LankaIoc,
    Sinopec,
    Other,
}

impl Brand {
    pub fn as_str(self) -> &'static str {
        match self {
            Brand::Ceypetco => "ceypetco",
            Brand::LankaIoc => "lanka_ioc",
            Brand::Sinopec => "sinopec",
            Brand::Other => "other",
        }
    }

    /// Best-effort brand detection for places that only expose a display name.
    pub fn from_place_name(name: &str) -> Self {
        let lowered = name.to_ascii_lowercase();
        let words: Vec<&str> = lowered
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect();
        let normalized = words.concat();

        if normalized.contains("ceypetco") || normalized.contains("ceylonpetroleum") {
            Brand::Ceypetco
        } else if words.iter().any(|word| matches!(*word, "ioc" | "lioc"))
            || normalized.contains("indianoil")
        {
            Brand::LankaIoc
        } else if normalized.contains("sinopec") {
            Brand::Sinopec
        } else {
            Brand::Other
        }
    }
}

impl FromStr for Brand {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ceypetco" => Ok(Brand::Ceypetco),
            "lanka_ioc" => Ok(Brand::LankaIoc),
            "sinopec" => Ok(Brand::Sinopec),
            "other" => Ok(Brand::Other),
            other => Err(UnknownVariant {
                kind: "brand",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationSource {
    Internal,
    External,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinatesError {
    #[error("latitude must be a finite value between -90 and 90, got {0}")]
    Latitude(f64),
    #[error("longitude must be a finite value between -180 and 180, got {0}")]
    Longitude(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinatesError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinatesError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinatesError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelStatus {
    pub fuel_kind: FuelKind,
    pub available: bool,
    pub price: Option<f64>,
    pub queue_length: QueueLength,
    pub last_updated: Option<String>,
}

impl FuelStatus {
    pub fn unknown(fuel_kind: FuelKind) -> Self {
        Self {
            fuel_kind,
            available: false,
            price: None,
            queue_length: QueueLength::None,
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub brand: Brand,
    pub location: Coordinates,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub fuel_statuses: Vec<FuelStatus>,
    pub source: StationSource,
    pub place_id: Option<String>,
    pub is_linked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

impl Station {
    /// Identifiers under which this station may appear in another source.
    pub fn dedupe_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.place_id.as_deref())
    }

    pub fn fuel_status(&self, fuel_kind: FuelKind) -> Option<&FuelStatus> {
        self.fuel_statuses
            .iter()
            .find(|status| status.fuel_kind == fuel_kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub fuel_kind: FuelKind,
    pub available: bool,
    pub price: Option<f64>,
    #[serde(default)]
    pub queue_length: QueueLength,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub station_id: String,
    pub fuel_kind: FuelKind,
    pub available: bool,
    pub price: Option<f64>,
    pub queue_length: QueueLength,
    pub comment: Option<String>,
    pub user_id: Option<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub status: AuthStatus,
}

impl SessionUser {
    pub fn authenticated(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            display_name: Some(display_name.into()),
            status: AuthStatus::Authenticated,
        }
    }

    pub fn authenticated_id(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated => self.id.as_deref(),
            AuthStatus::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Brand, Coordinates, FuelKind, QueueLength};

    #[test]
    fn fuel_kind_round_trips_through_its_wire_name() {
        for kind in FuelKind::ALL {
            assert_eq!(kind.as_str().parse::<FuelKind>(), Ok(kind));
        }
        assert!("kerosene".parse::<FuelKind>().is_err());
    }

    #[test]
    fn serializes_fuel_kind_and_queue_length_as_snake_case() {
        assert_eq!(
            serde_json::to_value(FuelKind::SuperDiesel).expect("serializable"),
            "super_diesel"
        );
        assert_eq!(
            serde_json::to_value(QueueLength::Medium).expect("serializable"),
            "medium"
        );
    }

    #[test]
    fn infers_brand_from_place_name() {
        assert_eq!(
            Brand::from_place_name("Ceylon Petroleum Filling Station"),
            Brand::Ceypetco
        );
        assert_eq!(Brand::from_place_name("Lanka IOC - Kandy Rd"), Brand::LankaIoc);
        assert_eq!(Brand::from_place_name("SINOPEC Nugegoda"), Brand::Sinopec);
        assert_eq!(Brand::from_place_name("Rajapaksa Fuel Mart"), Brand::Other);
        assert_eq!(Brand::from_place_name("LIOC Fuel Station"), Brand::LankaIoc);
        assert_eq!(Brand::from_place_name("Biocare Fuels"), Brand::Other);
        assert_eq!(Brand::from_place_name("Rioco Filling Station"), Brand::Other);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinates::new(6.9, 79.8).is_ok());
        assert!(Coordinates::new(91.0, 79.8).is_err());
        assert!(Coordinates::new(6.9, -181.0).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }
}
