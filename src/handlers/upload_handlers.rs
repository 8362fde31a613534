//! Upload handler. Streams the request body to disk chunk by chunk so large
//! files never sit in memory, then registers the record with the core
//! service. Text bodies become pastes; everything else is a file.

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::record::{Payload, Record};
use crate::services::cdn_service::CdnService;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::info;
use uuid::Uuid;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Query params accepted by `POST /upload`.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original filename; its extension survives into the public link.
    pub filename: Option<String>,
    /// Admin secret; a match marks the record privileged.
    pub secret: Option<String>,
    /// Requested lifetime in days, stored as an absolute deadline that
    /// overrides the retention curve.
    pub retention: Option<i64>,
}

/// `POST /upload` — raw streaming body, metadata in headers and query params.
pub async fn upload(
    State(service): State<CdnService>,
    Query(q): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let cfg = service.config.clone();
    let privileged = cfg.is_admin_secret(q.secret.as_deref());

    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "application/octet-stream".into());
    let extension = q
        .filename
        .as_deref()
        .and_then(file_extension)
        .unwrap_or_default();

    // Declared type only; there is no content sniffing. Privileged uploads
    // bypass the blocklist, matching the admin's own risk.
    if !privileged
        && (cfg.blocked_extensions.contains(&extension)
            || cfg.blocked_content_types.contains(&declared_type))
    {
        return Err(AppError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("uploads of `{declared_type}` are not accepted"),
        ));
    }

    let upload_dir = upload_dir(&cfg, privileged);
    fs::create_dir_all(&upload_dir).await?;

    // Stream to a temp name first; the final name needs the reserved key.
    let tmp_path = upload_dir.join(format!(".tmp-{}", Uuid::new_v4()));
    let size_bytes = match write_body(
        &tmp_path,
        body.into_data_stream(),
        cfg.size_cap_bytes(privileged),
    )
    .await
    {
        Ok(size) => size,
        Err(WriteError::TooLarge) => {
            return Err(AppError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "file exceeds the configured size limit",
            ));
        }
        Err(WriteError::Io(err)) => return Err(err.into()),
    };

    let created_at = CdnService::now_ms();
    let expires_at = q
        .retention
        .filter(|days| *days > 0)
        .map(|days| created_at + days * DAY_MS);
    let is_text = declared_type.starts_with("text/");

    let reserved = service
        .reserve_record(|key| {
            let path = final_path(&upload_dir, key, &extension);
            let payload = if is_text {
                Payload::Paste {
                    path,
                    language: paste_language(&extension, &declared_type),
                }
            } else {
                Payload::File {
                    path,
                    mime_type: declared_type.clone(),
                }
            };
            Record {
                payload,
                privileged,
                created_at,
                expires_at,
            }
        })
        .await;
    let (key, _record) = match reserved {
        Ok(reserved) => reserved,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
    };

    // The key is claimed; move the payload into place. A failed rename rolls
    // the claim back so no record points at nothing.
    let final_file = final_path(&upload_dir, &key, &extension);
    if let Err(err) = fs::rename(&tmp_path, &final_file).await {
        let _ = service.store.delete(&key).await;
        let _ = fs::remove_file(&tmp_path).await;
        return Err(AppError::internal(format!("failed to place upload: {err}")));
    }

    info!(
        %key,
        size_bytes,
        privileged,
        "stored {}",
        if is_text { "paste" } else { "file" }
    );

    let tail = if extension.is_empty() {
        key
    } else {
        format!("{key}.{extension}")
    };
    Ok((StatusCode::OK, cfg.public_link(&tail)))
}

enum WriteError {
    TooLarge,
    Io(io::Error),
}

/// Stream the body into `path`, enforcing the size cap as bytes arrive.
/// The partial file is removed on any failure.
async fn write_body<S>(path: &Path, stream: S, cap_bytes: Option<u64>) -> Result<u64, WriteError>
where
    S: Stream<Item = Result<Bytes, axum::Error>>,
{
    let mut file = File::create(path).await.map_err(WriteError::Io)?;
    let mut written: u64 = 0;
    pin_mut!(stream);

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = fs::remove_file(path).await;
                return Err(WriteError::Io(io::Error::other(err)));
            }
        };
        written += chunk.len() as u64;
        if let Some(cap) = cap_bytes {
            if written > cap {
                let _ = fs::remove_file(path).await;
                return Err(WriteError::TooLarge);
            }
        }
        if let Err(err) = file.write_all(&chunk).await {
            let _ = fs::remove_file(path).await;
            return Err(WriteError::Io(err));
        }
    }
    if let Err(err) = file.flush().await {
        let _ = fs::remove_file(path).await;
        return Err(WriteError::Io(err));
    }
    if let Err(err) = file.sync_all().await {
        let _ = fs::remove_file(path).await;
        return Err(WriteError::Io(err));
    }
    Ok(written)
}

fn upload_dir(cfg: &AppConfig, privileged: bool) -> PathBuf {
    Path::new(&cfg.storage_dir).join(if privileged {
        "uploads_admin"
    } else {
        "uploads"
    })
}

fn final_path(dir: &Path, key: &str, extension: &str) -> PathBuf {
    if extension.is_empty() {
        dir.join(key)
    } else {
        dir.join(format!("{key}.{extension}"))
    }
}

fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn paste_language(extension: &str, declared_type: &str) -> String {
    if !extension.is_empty() {
        return extension.to_string();
    }
    declared_type
        .strip_prefix("text/")
        .unwrap_or("plain")
        .to_string()
}
