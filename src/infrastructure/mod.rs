pub mod config;
pub mod coverage_cache;
pub mod credential_store;
pub mod error;
pub mod range_mapper;
pub mod schedule_client;
