use tracing_subscriber::{EnvFilter, fmt};

use crate::app::AppError;

pub const SERVER_FILTER: &str = "info,actix_server=warn";
pub const JOB_FILTER: &str = "info";

/// `RUST_LOG` wins over `default_directives` when set.
pub fn init(default_directives: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(AppError::logging_init)
}
