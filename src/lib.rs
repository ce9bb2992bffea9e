pub mod cache;
pub mod config;
pub mod error;
pub mod facts;
pub mod fetch;
pub mod gtfs;
pub mod loader;
pub mod metrics;
pub mod output;
