//! Admin surface: list everything, delete by key. Guarded by the shared
//! admin secret; there is no session layer.

use crate::errors::AppError;
use crate::services::cdn_service::{CdnIndex, CdnService};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub secret: Option<String>,
}

fn authorize(service: &CdnService, q: &AdminQuery) -> Result<(), AppError> {
    if service.config.is_admin_secret(q.secret.as_deref()) {
        Ok(())
    } else {
        Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "admin secret required",
        ))
    }
}

/// `GET /admin/list` — grouped index of all stored records.
pub async fn list_records(
    State(service): State<CdnService>,
    Query(q): Query<AdminQuery>,
) -> Result<Json<CdnIndex>, AppError> {
    authorize(&service, &q)?;
    Ok(Json(service.list().await?))
}

/// `DELETE /admin/{key}` — remove a record and its backing file.
pub async fn delete_record(
    State(service): State<CdnService>,
    Path(key): Path<String>,
    Query(q): Query<AdminQuery>,
) -> Result<StatusCode, AppError> {
    authorize(&service, &q)?;
    service.delete(&key).await?;
    info!(%key, "admin removed record");
    Ok(StatusCode::NO_CONTENT)
}
