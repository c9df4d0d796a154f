pub mod backfill;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod storage;
pub mod utils;
