pub mod changes;
pub mod history;
pub mod models;
pub mod snapshot;
