fn main() {
    if let Err(err) = fuel_finder_api::app::run_refresh_job() {
        eprintln!("price refresh failed: {err}");
        std::process::exit(1);
    }
}
