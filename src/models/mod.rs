//! Core data model for the content-delivery service.
//!
//! A single `Record` type describes every stored entry. Records serialize
//! naturally as JSON via `serde` and round-trip exactly through the record
//! store.

pub mod record;
