// ABOUTME: Request field validation shared by the REST handlers
// ABOUTME: Length limits, email and URL shape, and tag normalization with 400-class errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use recast_core::constants::limits::{
    MAX_CONTENT_CHARS, MAX_NAME_CHARS, MAX_TAGS, MAX_TITLE_CHARS, MIN_PASSWORD_CHARS,
};
use recast_core::errors::{AppError, AppResult, ErrorCode};
use url::Url;

fn missing(field: &str) -> AppError {
    AppError::new(ErrorCode::MissingRequiredField, format!("{field} is required"))
}

fn too_long(field: &str, max: usize) -> AppError {
    AppError::new(
        ErrorCode::ValueOutOfRange,
        format!("{field} must be at most {max} characters"),
    )
}

/// Trimmed, non-empty text of at most `max` characters
///
/// # Errors
///
/// `MISSING_REQUIRED_FIELD` when blank, `VALUE_OUT_OF_RANGE` when too long
pub fn required_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(missing(field));
    }
    if value.chars().count() > max {
        return Err(too_long(field, max));
    }
    Ok(value.to_owned())
}

/// Optional text: blank becomes `None`
///
/// # Errors
///
/// `VALUE_OUT_OF_RANGE` when longer than `max`
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> AppResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > max => Err(too_long(field, max)),
        Some(v) => Ok(Some(v.to_owned())),
        None => Ok(None),
    }
}

/// Content title, 1 to 200 characters
///
/// # Errors
///
/// See [`required_text`]
pub fn title(value: &str) -> AppResult<String> {
    required_text("title", value, MAX_TITLE_CHARS)
}

/// Folder, persona or template name
///
/// # Errors
///
/// See [`required_text`]
pub fn name(value: &str) -> AppResult<String> {
    required_text("name", value, MAX_NAME_CHARS)
}

/// Source text of a content piece; kept as written apart from outer whitespace
///
/// # Errors
///
/// See [`required_text`]
pub fn original_text(value: &str) -> AppResult<String> {
    required_text("original_text", value, MAX_CONTENT_CHARS)
}

/// Optional `http`/`https` source URL
///
/// # Errors
///
/// `INVALID_FORMAT` for anything that is not an absolute web URL
pub fn source_url(value: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(Some(url.to_string()))
        }
        _ => Err(AppError::new(
            ErrorCode::InvalidFormat,
            format!("source_url '{raw}' is not a valid http(s) URL"),
        )),
    }
}

/// Trim tags, drop blanks and case-insensitive duplicates, keep order
///
/// # Errors
///
/// `VALUE_OUT_OF_RANGE` for too many tags or an overlong tag
pub fn tags(values: &[String]) -> AppResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for tag in values.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tag.chars().count() > MAX_NAME_CHARS {
            return Err(too_long("tag", MAX_NAME_CHARS));
        }
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_owned());
        }
    }
    if out.len() > MAX_TAGS {
        return Err(AppError::new(
            ErrorCode::ValueOutOfRange,
            format!("At most {MAX_TAGS} tags are allowed"),
        ));
    }
    Ok(out)
}

/// Lowercased email with a plausible `local@domain.tld` shape
///
/// # Errors
///
/// `INVALID_FORMAT` for a malformed address
pub fn email(value: &str) -> AppResult<String> {
    let value = value.trim().to_lowercase();
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain.contains('.')
            && !domain.contains('@')
    }) && !value.chars().any(char::is_whitespace)
        && value.len() <= 254;
    if valid {
        Ok(value)
    } else {
        Err(AppError::new(ErrorCode::InvalidFormat, "Invalid email address"))
    }
}

/// Password of at least eight characters
///
/// # Errors
///
/// `VALUE_OUT_OF_RANGE` when too short
pub fn password(value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::new(
            ErrorCode::ValueOutOfRange,
            format!("Password must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_bounds() {
        assert_eq!(title("  Hello  ").unwrap(), "Hello");
        assert_eq!(title("   ").unwrap_err().code, ErrorCode::MissingRequiredField);
        assert!(title(&"t".repeat(MAX_TITLE_CHARS)).is_ok());
        assert_eq!(
            title(&"t".repeat(MAX_TITLE_CHARS + 1)).unwrap_err().code,
            ErrorCode::ValueOutOfRange
        );
    }

    #[test]
    fn test_source_url() {
        assert_eq!(
            source_url(Some("https://example.com/post")).unwrap().as_deref(),
            Some("https://example.com/post")
        );
        assert_eq!(source_url(Some("  ")).unwrap(), None);
        assert_eq!(source_url(None).unwrap(), None);
        assert!(source_url(Some("ftp://example.com")).is_err());
        assert!(source_url(Some("not a url")).is_err());
    }

    #[test]
    fn test_tags_are_normalized() {
        let input = vec![" rust ".to_owned(), "Rust".to_owned(), String::new(), "async".to_owned()];
        assert_eq!(tags(&input).unwrap(), vec!["rust", "async"]);

        let many: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(tags(&many).is_err());
    }

    #[test]
    fn test_email_and_password() {
        assert_eq!(email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["ada", "@example.com", "ada@example", "ada@.com", "a da@example.com"] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
        assert!(password("12345678").is_ok());
        assert!(password("1234567").is_err());
    }
}
