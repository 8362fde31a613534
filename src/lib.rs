//! hostbin — personal content-delivery service.
//!
//! Accepts file uploads, text pastes, and URL shortening requests; stores
//! one JSON record per entry in a key-value store and serves content back by
//! short random key. A periodic retention sweep deletes expired entries.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
