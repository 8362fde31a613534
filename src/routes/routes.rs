//! Defines routes for all content-delivery operations.
//!
//! ## Structure
//! - **Creation endpoints**
//!   - `POST /upload` — file or paste upload (raw streaming body)
//!   - `POST /short`  — URL shortening (plain-text body)
//!
//! - **Resolution endpoint**
//!   - `GET /{key}` — redirect (short link), inline text (paste), or
//!     streamed bytes (file); the key may carry a cosmetic extension
//!
//! - **Admin endpoints** (shared-secret guarded)
//!   - `GET    /admin/list`  — grouped index of all records
//!   - `DELETE /admin/{key}` — remove record + backing file
//!
//! Static segments win over the `/{key}` capture, so `upload`, `short`,
//! `admin`, and the health endpoints are never shadowed.

use crate::{
    handlers::{
        admin_handlers::{delete_record, list_records},
        health_handlers::{healthz, readyz},
        resolve_handlers::resolve,
        shortlink_handlers::shorten,
        upload_handlers::upload,
    },
    services::cdn_service::CdnService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all routes.
///
/// The router carries shared state (`CdnService`) to all handlers.
pub fn routes() -> Router<CdnService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // creation endpoints
        .route("/upload", post(upload))
        .route("/short", post(shorten))
        // admin endpoints
        .route("/admin/list", get(list_records))
        .route("/admin/{key}", delete(delete_record))
        // public resolution
        .route("/{key}", get(resolve))
}
