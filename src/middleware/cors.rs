// ABOUTME: CORS middleware configuration for the REST API
// ABOUTME: Allows configured web-app origins, or any origin when set to "*"
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};
use recast_core::constants::auth::ADMIN_KEY_HEADER;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::request_id::REQUEST_ID_HEADER;

/// Configure CORS from `CORS_ORIGINS`
///
/// An empty list or a `*` entry allows any origin; otherwise only the listed
/// origins are allowed. Unparsable entries are skipped.
#[must_use]
pub fn setup_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            REQUEST_ID_HEADER,
            HeaderName::from_static(ADMIN_KEY_HEADER),
        ])
        .expose_headers([REQUEST_ID_HEADER])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
}
