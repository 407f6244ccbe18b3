fn main() {
    if let Err(err) = fuel_finder_api::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
