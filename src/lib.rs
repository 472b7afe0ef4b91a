pub mod auth;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod openapi;
pub mod ranking;
pub mod rate_limit;
pub mod reconcile;
pub mod repo;
pub mod routes;
pub mod security;
pub mod status;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
