fn main() {
    if let Err(err) = attest_history::app::run_diff() {
        eprintln!("diff failed: {err}");
        std::process::exit(1);
    }
}
