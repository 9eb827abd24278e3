// Library root: exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod api;
pub mod cache;
pub mod credentials;
pub mod db;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod telemetry;

// Only the binary needs these, but they stay public so tests can build a
// `Config` the same way `main.rs` does.
pub mod cli;
pub mod config;
pub mod logging;
