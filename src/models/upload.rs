use bytes::Bytes;

use crate::constants::{ERR_EMPTY_FILE, ERR_MISSING_FILE_NAME, ERR_NOT_AN_IMAGE};
use crate::error::{AppError, Result};

/// A file picked by the user and waiting to be uploaded
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Final path component of the client-supplied name
    ///
    /// Browsers normally send a bare name, but some clients send a full path.
    pub fn display_name(&self) -> &str {
        self.file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name)
            .trim()
    }

    /// Check the upload before anything is written
    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        if self.display_name().is_empty() || self.display_name() == ".." {
            return Err(AppError::InvalidInput(ERR_MISSING_FILE_NAME.to_string()));
        }

        if self.bytes.is_empty() {
            return Err(AppError::InvalidInput(ERR_EMPTY_FILE.to_string()));
        }

        if self.bytes.len() > max_bytes {
            tracing::warn!(
                "Upload too large: {} ({} bytes, max: {})",
                self.display_name(),
                self.bytes.len(),
                max_bytes
            );
            return Err(AppError::PayloadTooLarge);
        }

        if !is_image_content_type(&self.content_type) {
            return Err(AppError::InvalidInput(ERR_NOT_AN_IMAGE.to_string()));
        }

        Ok(())
    }

    /// Storage key `<unix-millis>-<file-name>`
    pub fn storage_key(&self, timestamp_ms: i64) -> String {
        format!("{}-{}", timestamp_ms, self.display_name())
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
