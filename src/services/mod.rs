//! Core services: record storage, key generation, the retention policy and
//! its periodic sweeper, and the service facade the HTTP layer drives.

pub mod cdn_service;
pub mod keygen;
pub mod record_store;
pub mod retention;
pub mod sweeper;
