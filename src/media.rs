//! Turns a user-selected file into an inline, self-contained [`MediaRef`].

use crate::db::models::{MediaKind, MediaRef};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("could not read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported media type: {mime_type}")]
    Unsupported { mime_type: String },
}

#[derive(Debug, Clone)]
pub enum MediaSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file handed over by the front end, with its declared MIME type.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub source: MediaSource,
}

impl MediaFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: MediaSource::Bytes(bytes),
        }
    }

    /// Uses `mime_type` when given, otherwise guesses from the extension.
    pub fn from_path(path: impl AsRef<Path>, mime_type: Option<&str>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let mime_type = mime_type.map(str::to_string).unwrap_or_else(|| {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        Self {
            name,
            mime_type,
            source: MediaSource::Path(path.to_path_buf()),
        }
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::classify(&self.mime_type)
    }
}

impl MediaKind {
    /// Maps a MIME type onto the kinds a conversation accepts.
    pub fn classify(mime_type: &str) -> Option<MediaKind> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if mime_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

pub async fn encode(file: &MediaFile) -> Result<MediaRef, MediaError> {
    let kind = file.kind().ok_or_else(|| MediaError::Unsupported {
        mime_type: file.mime_type.clone(),
    })?;

    let data = match &file.source {
        MediaSource::Bytes(bytes) => BASE64_STANDARD.encode(bytes),
        MediaSource::Path(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| MediaError::Read {
                    name: file.name.clone(),
                    source,
                })?;
            BASE64_STANDARD.encode(bytes)
        }
    };

    tracing::debug!(name = %file.name, mime_type = %file.mime_type, encoded_len = data.len(), "encoded media");

    Ok(MediaRef {
        kind,
        inline_data: data,
        mime_type: file.mime_type.clone(),
    })
}
