//! URL shortening handler.

use crate::errors::AppError;
use crate::services::cdn_service::CdnService;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use url::Url;

/// `POST /short` — plain-text body carrying the URL to shorten. Answers with
/// the public link for the reserved key.
pub async fn shorten(
    State(service): State<CdnService>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let raw = body.trim();
    if raw.is_empty() {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "no URL provided"));
    }

    let target = Url::parse(raw)
        .map_err(|_| AppError::new(StatusCode::BAD_REQUEST, "invalid URL provided"))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "only http(s) URLs can be shortened",
        ));
    }

    let key = service.create_short_link(target.as_str()).await?;
    info!(%key, "shortened {raw}");
    Ok((StatusCode::OK, service.config.public_link(&key)))
}
