use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{App, HttpServer, middleware::Logger, web};

use crate::adapters::api::{ApiState, USER_ID_HEADER, configure_routes};
use crate::adapters::places::HttpPlacesClient;
use crate::adapters::price_feed::HttpPriceFeed;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::refresh::run_refresh;
use crate::app::search::StationSearch;
use crate::app::services::SqliteStationService;
use crate::domain::location::LocationResolver;
use crate::domain::payloads::RefreshSummary;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct Components {
    stations: SqliteStationService,
    places: Option<HttpPlacesClient>,
    price_feed: Option<HttpPriceFeed>,
}

fn build_components(config: &AppConfig) -> Result<Components, AppError> {
    if let Some(parent) = std::path::Path::new(&config.db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(AppError::database_init)?;
    }

    let mut connection =
        crate::adapters::db::open_connection(&config.db_path).map_err(AppError::database_init)?;
    crate::adapters::db::run_migrations(&mut connection).map_err(AppError::database_init)?;
    let stations = SqliteStationService::new(Arc::new(Mutex::new(connection)));

    let places = match &config.places_api_key {
        Some(key) => Some(
            HttpPlacesClient::new(&config.places_api_base_url, key).map_err(AppError::runtime)?,
        ),
        None => {
            tracing::warn!("PLACES_API_KEY not set, external station source disabled");
            None
        }
    };

    let price_feed = config
        .price_feed_url
        .as_deref()
        .map(HttpPriceFeed::new)
        .transpose()
        .map_err(AppError::runtime)?;

    Ok(Components {
        stations,
        places,
        price_feed,
    })
}

/// Runs the price refresh every `interval` on its own thread until `stop_flag` is set.
pub fn start_refresh_loop(
    feed: HttpPriceFeed,
    stations: SqliteStationService,
    interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();

        while !stop_flag.load(Ordering::Relaxed) {
            match system.block_on(run_refresh(&feed, &stations)) {
                Ok(summary) => tracing::debug!(
                    updated = summary.updated,
                    errors = summary.errors,
                    "scheduled price refresh completed"
                ),
                Err(error) => tracing::warn!(error = %error, "scheduled price refresh failed"),
            }

            let deadline = Instant::now() + interval;
            while !stop_flag.load(Ordering::Relaxed) && Instant::now() < deadline {
                std::thread::sleep(STOP_POLL_INTERVAL);
            }
        }
    })
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let components = build_components(&config)?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let refresh_handle = match (&components.price_feed, config.refresh_interval_secs) {
        (Some(feed), interval_secs) if interval_secs > 0 => Some(start_refresh_loop(
            feed.clone(),
            components.stations.clone(),
            Duration::from_secs(interval_secs),
            Arc::clone(&stop_flag),
        )),
        _ => {
            tracing::info!("scheduled price refresh disabled");
            None
        }
    };

    let server_result = serve(&config, components);

    stop_flag.store(true, Ordering::Relaxed);
    if let Some(handle) = refresh_handle
        && handle.join().is_err()
    {
        return Err(AppError::runtime("price refresh thread panicked"));
    }

    server_result
}

pub fn run_api(config: AppConfig) -> Result<(), AppError> {
    let components = build_components(&config)?;
    serve(&config, components)
}

pub fn run_refresh_once(config: AppConfig) -> Result<RefreshSummary, AppError> {
    let components = build_components(&config)?;
    let feed = components
        .price_feed
        .ok_or_else(|| AppError::config("PRICE_FEED_URL is required for the refresh job"))?;

    actix_web::rt::System::new()
        .block_on(run_refresh(&feed, &components.stations))
        .map_err(AppError::runtime)
}

fn serve(config: &AppConfig, components: Components) -> Result<(), AppError> {
    let api_state = ApiState {
        search: StationSearch::new(
            components.stations.clone(),
            components.places.clone(),
            LocationResolver::new(config.fallback),
            config.default_search_radius_m,
            config.max_search_radius_m,
        ),
        stations: components.stations,
        places: components.places,
        price_feed: components.price_feed,
    };
    let cors_origin = config.cors_allowed_origin.clone();
    let http_bind = config.http_bind.clone();

    tracing::info!(bind = %http_bind, "http server starting");

    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .wrap(cors_policy(cors_origin.as_deref()))
                    .wrap(Logger::default())
                    .app_data(web::Data::new(api_state.clone()))
                    .configure(configure_routes)
            })
            .bind(&http_bind)?
            .run()
            .await
        })
        .map_err(AppError::runtime)
}

fn cors_policy(allowed_origin: Option<&str>) -> Cors {
    let cors = match allowed_origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };

    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![CONTENT_TYPE.as_str(), USER_ID_HEADER])
        .max_age(3600)
}
