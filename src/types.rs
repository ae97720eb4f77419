//! Shared value types for request data.

use serde::Serialize;

/// Key-value pair type for parameters (faster than HashMap for small collections).
pub type ParamList = Vec<(String, String)>;

/// Upload completed without error.
pub const UPLOAD_ERR_OK: u8 = 0;

/// Upload exceeded the configured size limit.
pub const UPLOAD_ERR_SIZE: u8 = 1;

/// Represents an uploaded file from multipart form data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Original filename
    pub name: String,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Temporary file path on disk
    pub tmp_name: String,
    /// File size in bytes
    pub size: u64,
    /// Upload error code (0 = success)
    pub error: u8,
}

impl UploadedFile {
    /// Whether the upload finished and the temp file holds the content.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error == UPLOAD_ERR_OK
    }
}
