use crate::error::AppError;

/// Clean HTML content using the ammonia library.
///
/// This employs a whitelist-based sanitization strategy: it preserves safe tags
/// (like <b>, <p>) while stripping dangerous tags (like <script>, <iframe>)
/// and malicious attributes (like onclick).
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims user text, sanitizes it, and enforces `1..=max_chars` characters.
///
/// Both limits apply to the sanitized text, which is what gets stored.
pub fn normalize_content(input: &str, max_chars: usize) -> Result<String, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Content is required".to_string()));
    }
    // The raw input is held to the same limit.
    if trimmed.chars().count() > max_chars {
        return Err(content_too_long(max_chars));
    }

    let cleaned = clean_html(trimmed);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(AppError::BadRequest("Content is required".to_string()));
    }
    if cleaned.chars().count() > max_chars {
        return Err(content_too_long(max_chars));
    }
    Ok(cleaned.to_string())
}

fn content_too_long(max_chars: usize) -> AppError {
    AppError::BadRequest(format!(
        "Content must be at most {} characters",
        max_chars
    ))
}
