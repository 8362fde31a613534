//! Represents one stored entry: an uploaded file, a text paste, or a short link.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content-specific part of a record, tagged by `type` in the serialized form.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum Payload {
    /// Arbitrary uploaded file, served back with its stored mime type.
    #[serde(rename = "file")]
    File { path: PathBuf, mime_type: String },

    /// Text upload served inline; `language` is the source-language tag
    /// (file extension, or the `text/*` subtype when no extension is known).
    #[serde(rename = "paste")]
    Paste { path: PathBuf, language: String },

    /// Redirect to an external URL. Owns no filesystem resource and is
    /// exempt from retention.
    #[serde(rename = "short")]
    ShortLink { target: String },
}

/// One stored entry. All fields are immutable once written; the lookup key
/// lives outside the record, in the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Record {
    #[serde(flatten)]
    pub payload: Payload,

    /// Whether the entry was created with the admin secret. Privileged
    /// records use the admin size cap when retention is evaluated.
    #[serde(default)]
    pub privileged: bool,

    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,

    /// Explicit user-requested deletion time (ms since epoch). When set it
    /// overrides the retention curve entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Record {
    pub fn short_link(target: impl Into<String>, created_at: i64) -> Self {
        Self {
            payload: Payload::ShortLink {
                target: target.into(),
            },
            privileged: false,
            created_at,
            expires_at: None,
        }
    }

    /// Path of the backing file, if the record owns one.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::File { path, .. } | Payload::Paste { path, .. } => Some(path),
            Payload::ShortLink { .. } => None,
        }
    }
}
