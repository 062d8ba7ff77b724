// ABOUTME: Signed Cloudinary uploads for images and videos attached to content
// ABOUTME: Encodes the file as a data URI and signs folder and timestamp with SHA-256
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use recast_core::constants::limits::MAX_UPLOAD_BYTES;
use recast_core::constants::media::UPLOAD_FOLDER;
use recast_core::errors::{AppError, AppResult, ErrorCode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::config::environment::CloudinaryConfig;

/// A stored asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    /// HTTPS delivery URL
    #[serde(alias = "secure_url")]
    pub url: String,
    /// Cloudinary id
    pub public_id: String,
    /// `image` or `video`
    pub resource_type: String,
    /// Stored size
    pub bytes: u64,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    resource_type: String,
    bytes: u64,
}

#[derive(Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

/// Check the declared type and size of an upload
///
/// # Errors
///
/// `INVALID_FORMAT` for anything but `image/*` or `video/*`, `VALUE_OUT_OF_RANGE`
/// for empty or oversized files
pub fn validate_upload(content_type: &str, len: usize) -> AppResult<()> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if !(essence.starts_with("image/") || essence.starts_with("video/")) {
        return Err(AppError::new(
            ErrorCode::InvalidFormat,
            format!("Unsupported media type '{essence}'; upload an image or video"),
        ));
    }
    if len == 0 {
        return Err(AppError::new(ErrorCode::ValueOutOfRange, "The uploaded file is empty"));
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(AppError::new(
            ErrorCode::ValueOutOfRange,
            format!("Files are limited to {} MiB", MAX_UPLOAD_BYTES / (1024 * 1024)),
        ));
    }
    Ok(())
}

/// `data:{mime};base64,{payload}`
#[must_use]
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}

/// Hex SHA-256 of the sorted signed parameters followed by the API secret
#[must_use]
pub fn sign_params(folder: &str, timestamp: i64, api_secret: &str) -> String {
    hex::encode(Sha256::digest(
        format!("folder={folder}&timestamp={timestamp}{api_secret}").as_bytes(),
    ))
}

/// Cloudinary upload client
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    /// Create a client for the configured cloud
    #[must_use]
    pub const fn new(client: Client, config: CloudinaryConfig) -> Self {
        Self { client, config }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/auto/upload",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Upload a file into the Recast folder
    ///
    /// # Errors
    ///
    /// Returns a validation error for unsupported files, or
    /// `EXTERNAL_SERVICE_ERROR` when Cloudinary rejects the upload
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload(&self, content_type: &str, bytes: &[u8]) -> AppResult<UploadedMedia> {
        validate_upload(content_type, bytes.len())?;

        let timestamp = Utc::now().timestamp();
        let signature = sign_params(UPLOAD_FOLDER, timestamp, &self.config.api_secret);
        let timestamp = timestamp.to_string();
        let file = data_uri(content_type, bytes);
        let form = [
            ("file", file.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("folder", UPLOAD_FOLDER),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.upload_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("Cloudinary", format!("Upload request failed: {e}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<CloudinaryErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(AppError::external_service("Cloudinary", message));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| {
                AppError::external_service("Cloudinary", format!("Invalid upload response: {e}"))
            })?;
        info!(public_id = %uploaded.public_id, bytes = uploaded.bytes, "Uploaded media");
        Ok(UploadedMedia {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            resource_type: uploaded.resource_type,
            bytes: uploaded.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_cloudinary_scheme() {
        let expected = hex::encode(Sha256::digest(b"folder=recast&timestamp=1315060510abcd"));
        assert_eq!(sign_params("recast", 1_315_060_510, "abcd"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_upload_validation() {
        assert!(validate_upload("image/jpeg", 10).is_ok());
        assert!(validate_upload("video/mp4; codecs=avc1", 10).is_ok());

        let err = validate_upload("application/pdf", 10).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);

        let err = validate_upload("image/png", MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert!(validate_upload("image/png", 0).is_err());
    }
}
