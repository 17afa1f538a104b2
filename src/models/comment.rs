use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};
use validator::Validate;

use super::user::UserSummary;

pub const MAX_COMMENT_CONTENT_CHARS: usize = 2000;

/// Minimal row used for parent, ownership and cascade checks.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub parent_comment_id: Option<i64>,
}

impl CommentRecord {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

/// A comment or reply as returned to clients, annotated for the requesting user.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    /// `None` for top-level comments.
    pub parent_comment_id: Option<i64>,
    pub author: UserSummary,
    pub content: String,
    pub likes_count: i64,
    pub replies_count: i64,
    pub is_liked: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for CommentView {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            parent_comment_id: row.try_get("parent_comment_id")?,
            author: UserSummary::from_prefixed(row, "author_")?,
            content: row.try_get("content")?,
            likes_count: row.try_get("likes_count")?,
            replies_count: row.try_get("replies_count")?,
            is_liked: row.try_get("is_liked")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(range(min = 1, message = "Post ID is required"))]
    pub post_id: i64,

    /// Trimmed and length-checked by the comment service.
    pub content: String,

    /// Optional: the top-level comment being replied to.
    pub parent_comment_id: Option<i64>,
}

/// DTO for editing a comment's text.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// Outcome of a comment cascade delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommentDeletion {
    pub comment_id: i64,
    pub replies_removed: u64,
    pub likes_removed: u64,
}
