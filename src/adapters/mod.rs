pub mod attestation_api;
pub mod http;
pub mod session_store;
pub mod snapshot_file;
