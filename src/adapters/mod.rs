pub mod api;
pub mod backend_client;
pub mod db;
pub mod places;
pub mod price_feed;
pub mod queue_file;
