fn main() {
    if let Err(err) = attest_history::app::run() {
        eprintln!("attest_history failed: {err}");
        std::process::exit(1);
    }
}
