//! Public key resolution: redirects short links, streams files, and serves
//! pastes inline. Stale records are healed by the service layer and surface
//! as 410 Gone.

use crate::errors::AppError;
use crate::services::cdn_service::{CdnService, Resolved};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// `GET /{key}` — keys may carry the original extension for readability;
/// only the part before the first dot is looked up.
pub async fn resolve(
    State(service): State<CdnService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let bare = key.split('.').next().unwrap_or(&key);

    match service.resolve(bare).await? {
        Resolved::ShortLink { target } => Ok(Redirect::temporary(&target).into_response()),

        Resolved::Paste { content, language } => {
            let mut response = Response::new(Body::from(content));
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            headers.insert(
                HeaderName::from_static("x-paste-language"),
                HeaderValue::from_str(&language)
                    .unwrap_or_else(|_| HeaderValue::from_static("plain")),
            );
            Ok(response)
        }

        Resolved::File { path, mime_type } => {
            // The file can still vanish between the existence check and the
            // open; report that window as gone too.
            let file = File::open(&path).await.map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => AppError::gone(format!("`{bare}` is gone")),
                _ => AppError::internal(err.to_string()),
            })?;
            let length = file.metadata().await.ok().map(|meta| meta.len());

            let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&mime_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            );
            if let Some(length) = length {
                if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
                    headers.insert(header::CONTENT_LENGTH, value);
                }
            }
            Ok(response)
        }
    }
}
