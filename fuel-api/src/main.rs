fn main() {
    if let Err(err) = fuel_finder_api::app::run_api() {
        eprintln!("api startup failed: {err}");
        std::process::exit(1);
    }
}
