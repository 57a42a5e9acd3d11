fn main() {
    if let Err(err) = attest_history::app::run_fetch() {
        eprintln!("fetch failed: {err}");
        std::process::exit(1);
    }
}
