pub mod clock;
pub mod fuel_status;
pub mod geo;
pub mod location;
pub mod models;
pub mod payloads;
pub mod station_merge;
