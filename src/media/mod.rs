// ABOUTME: Media storage for uploads attached to content
// ABOUTME: Cloudinary is the only backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

/// Signed Cloudinary uploads
pub mod cloudinary;

pub use cloudinary::{CloudinaryClient, UploadedMedia};
