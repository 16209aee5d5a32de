//! Local input checks, run before anything is sent to the backend

use std::path::Path;

use super::error::ValidationError;

/// Shortest report the text form will submit (after trimming)
pub const MIN_TEXT_LEN: usize = 10;

/// Largest image the upload form accepts
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types the image endpoint understands
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Check a report before submitting it for analysis
pub fn validate_text(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }

    let len = trimmed.chars().count();
    if len < MIN_TEXT_LEN {
        return Err(ValidationError::TextTooShort { min: MIN_TEXT_LEN, actual: len });
    }
    Ok(trimmed)
}

/// Feedback and location lookups only need something non-blank
pub fn validate_non_empty(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyText)
    } else {
        Ok(trimmed)
    }
}

pub fn validate_image_type(mime: &str) -> Result<(), ValidationError> {
    let mime = mime.trim().to_ascii_lowercase();
    if ACCEPTED_IMAGE_TYPES.contains(&mime.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedImageType { mime })
    }
}

pub fn validate_image_size(size: u64) -> Result<(), ValidationError> {
    if size == 0 {
        Err(ValidationError::EmptyFile)
    } else if size > MAX_IMAGE_BYTES {
        Err(ValidationError::ImageTooLarge { size, max: MAX_IMAGE_BYTES })
    } else {
        Ok(())
    }
}

/// Guess the MIME type from the file extension, the way a browser file picker does
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// An image that has passed type and size checks and is ready to upload.
///
/// There is no way to build one without going through validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl ImageUpload {
    /// Validate in-memory bytes
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, ValidationError> {
        let mime = mime.into();
        validate_image_type(&mime)?;
        validate_image_size(bytes.len() as u64)?;
        Ok(Self {
            file_name: file_name.into(),
            mime: mime.to_ascii_lowercase(),
            bytes,
        })
    }

    /// Validate a file on disk. Type and size are checked from the extension
    /// and metadata first, so an oversized file is never read into memory.
    pub async fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let mime = mime_from_path(path).ok_or_else(|| ValidationError::UnsupportedImageType {
            mime: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!("unknown (.{})", e))
                .unwrap_or_else(|| "unknown".to_string()),
        })?;
        validate_image_type(mime)?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ValidationError::Io { message: e.to_string() })?;
        if !metadata.is_file() {
            return Err(ValidationError::Io {
                message: format!("{} is not a file", path.display()),
            });
        }
        validate_image_size(metadata.len())?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::Io { message: e.to_string() })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Self::from_bytes(file_name, mime, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in MB with two decimals, for the file summary line
    pub fn size_mb(&self) -> String {
        format!("{:.2}", self.size_bytes() as f64 / 1024.0 / 1024.0)
    }

    pub(crate) fn into_parts(self) -> (String, String, Vec<u8>) {
        (self.file_name, self.mime, self.bytes)
    }
}
