// ABOUTME: Media upload route: buffers one multipart file and stores it on Cloudinary
// ABOUTME: Only images and videos up to the upload limit are accepted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use recast_core::constants::limits::MAX_UPLOAD_BYTES;
use recast_core::errors::{AppError, ErrorCode};
use tracing::info;

use crate::media::cloudinary::validate_upload;
use crate::middleware::AuthUser;
use crate::resources::ServerResources;

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Upload routes
pub struct UploadRoutes;

impl UploadRoutes {
    /// Create all upload routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/uploads", post(Self::handle_upload))
            .layer(DefaultBodyLimit::max(
                MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
            ))
            .with_state(resources)
    }

    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        auth: AuthUser,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let cloudinary = resources.require_cloudinary()?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::new(ErrorCode::InvalidFormat, format!("Malformed upload: {e}")))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let bytes = field.bytes().await.map_err(|e| {
                AppError::new(
                    ErrorCode::ValueOutOfRange,
                    format!("Could not read the uploaded file: {e}"),
                )
            })?;
            validate_upload(&content_type, bytes.len())?;

            let uploaded = cloudinary.upload(&content_type, &bytes).await?;
            info!(
                user_id = %auth.user_id,
                public_id = %uploaded.public_id,
                "Stored media upload"
            );
            return Ok((StatusCode::CREATED, Json(uploaded)).into_response());
        }

        Err(AppError::new(
            ErrorCode::MissingRequiredField,
            "Multipart field 'file' is required",
        ))
    }
}
