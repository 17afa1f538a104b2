// src/models/mod.rs

pub mod comment;
pub mod like;
pub mod page;
pub mod post;
pub mod story;
pub mod user;

use url::Url;

/// Longest accepted image reference, absolute or server-relative.
const MAX_IMAGE_URL_LEN: usize = 500;

/// Accepts absolute http(s) URLs and server-relative paths such as `/uploads/posts/a.png`.
pub(crate) fn validate_image_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.len() > MAX_IMAGE_URL_LEN {
        return Err(validator::ValidationError::new("url_too_long"));
    }
    if url.starts_with('/') && !url.starts_with("//") {
        return Ok(());
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_url")),
    }
}
