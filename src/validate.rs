use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;
pub const MAX_AUDIO_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("{category} of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        category: MediaCategory,
        size: u64,
        limit: u64,
    },
}

/// Allowed media categories, derived from the MIME type's primary part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Audio,
    Image,
    Video,
}

impl MediaCategory {
    /// Classify a MIME type, or None if it is outside the allow-list.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let primary = mime_type.split('/').next().unwrap_or("");
        match primary {
            "audio" => Some(MediaCategory::Audio),
            "image" => Some(MediaCategory::Image),
            "video" => Some(MediaCategory::Video),
            _ => None,
        }
    }

    /// Per-category upload ceiling in bytes. Exactly-at-limit is allowed.
    pub fn max_bytes(self) -> u64 {
        match self {
            MediaCategory::Audio => MAX_AUDIO_BYTES,
            MediaCategory::Image => MAX_IMAGE_BYTES,
            MediaCategory::Video => MAX_VIDEO_BYTES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Audio => "audio",
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a candidate object before any network call. Type first, then size;
/// pure function of its inputs.
pub fn validate(content_type: &str, byte_size: u64) -> Result<MediaCategory, ValidationError> {
    let category = MediaCategory::from_mime(content_type)
        .ok_or_else(|| ValidationError::UnsupportedType(content_type.to_string()))?;

    let limit = category.max_bytes();
    if byte_size > limit {
        return Err(ValidationError::TooLarge {
            category,
            size: byte_size,
            limit,
        });
    }

    Ok(category)
}
