//! # ReactShare Library
//!
//! Core of the ReactShare service: provider accounts and tokens, media
//! acquisition, reaction uploads, publishing to social platforms and
//! analytics, plus the HTTP surface over them.

pub mod acquisition;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod publishing;
pub mod repositories;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod token_refresh;
pub mod uploads;
pub use migration;
