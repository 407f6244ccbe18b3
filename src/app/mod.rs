mod config;
mod error;
mod logging;
pub mod refresh;
mod runtime;
pub mod search;
pub mod services;

pub use config::AppConfig;
pub use error::AppError;

/// Combined server: HTTP API plus the scheduled price refresh.
pub fn run() -> Result<(), AppError> {
    logging::init(logging::SERVER_FILTER)?;
    let config = bootstrap("combined")?;
    runtime::run(config)
}

pub fn run_api() -> Result<(), AppError> {
    logging::init(logging::SERVER_FILTER)?;
    let config = bootstrap("api")?;
    runtime::run_api(config)
}

/// Runs one price refresh and exits.
pub fn run_refresh_job() -> Result<(), AppError> {
    logging::init(logging::JOB_FILTER)?;
    let config = bootstrap("refresh")?;
    let summary = runtime::run_refresh_once(config)?;

    tracing::info!(
        updated = summary.updated,
        errors = summary.errors,
        "price refresh job finished"
    );
    Ok(())
}

fn bootstrap(mode: &'static str) -> Result<AppConfig, AppError> {
    let config = AppConfig::from_env()?;

    tracing::info!(
        mode,
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        places_enabled = config.places_api_key.is_some(),
        places_api_base_url = %config.places_api_base_url,
        price_feed_enabled = config.price_feed_url.is_some(),
        refresh_interval_secs = config.refresh_interval_secs,
        default_search_radius_m = config.default_search_radius_m,
        max_search_radius_m = config.max_search_radius_m,
        fallback_lat = config.fallback.lat,
        fallback_lng = config.fallback.lng,
        "application bootstrap initialized"
    );

    Ok(config)
}
