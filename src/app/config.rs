use crate::app::AppError;
use crate::domain::location::DEFAULT_FALLBACK;
use crate::domain::models::Coordinates;

const DEFAULT_PLACES_API_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub http_bind: String,
    pub places_api_key: Option<String>,
    pub places_api_base_url: String,
    pub price_feed_url: Option<String>,
    pub refresh_interval_secs: u64,
    pub default_search_radius_m: u32,
    pub max_search_radius_m: u32,
    pub fallback: Coordinates,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` when present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_search_radius_m = parse_or_default(&lookup, "DEFAULT_SEARCH_RADIUS_M", 5_000_u32)?;
        let max_search_radius_m = parse_or_default(&lookup, "MAX_SEARCH_RADIUS_M", 50_000_u32)?;
        if max_search_radius_m == 0 {
            return Err(AppError::config("MAX_SEARCH_RADIUS_M must be positive"));
        }
        if default_search_radius_m == 0 || default_search_radius_m > max_search_radius_m {
            return Err(AppError::config(
                "DEFAULT_SEARCH_RADIUS_M must be between 1 and MAX_SEARCH_RADIUS_M",
            ));
        }

        let fallback = Coordinates::new(
            parse_or_default(&lookup, "FALLBACK_LAT", DEFAULT_FALLBACK.lat)?,
            parse_or_default(&lookup, "FALLBACK_LNG", DEFAULT_FALLBACK.lng)?,
        )
        .map_err(|error| AppError::config(format!("fallback location is invalid: {error}")))?;

        Ok(Self {
            db_path: non_empty(&lookup, "DB_PATH")
                .unwrap_or_else(|| "./data/fuel_finder.db".to_string()),
            http_bind: non_empty(&lookup, "HTTP_BIND")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            places_api_key: non_empty(&lookup, "PLACES_API_KEY"),
            places_api_base_url: non_empty(&lookup, "PLACES_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PLACES_API_BASE_URL.to_string()),
            price_feed_url: non_empty(&lookup, "PRICE_FEED_URL"),
            refresh_interval_secs: parse_or_default(&lookup, "REFRESH_INTERVAL_SECS", 3_600_u64)?,
            default_search_radius_m,
            max_search_radius_m,
            fallback,
            cors_allowed_origin: non_empty(&lookup, "CORS_ALLOWED_ORIGIN"),
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
