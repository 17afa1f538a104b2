use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};
use validator::Validate;

use super::{user::UserSummary, validate_image_url};
use crate::error::AppError;

pub const MAX_POST_CONTENT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(AppError::BadRequest("Invalid visibility".to_string())),
        }
    }
}

/// Minimal row used for existence, ownership and visibility checks.
#[derive(Debug, Clone, FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub author_id: String,
    pub visibility: String,
}

impl PostRecord {
    pub fn is_visible_to(&self, viewer_id: &str) -> bool {
        self.visibility == Visibility::Public.as_str() || self.author_id == viewer_id
    }
}

/// A post as returned to clients, annotated for the requesting user.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub author: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub visibility: Visibility,
    pub likes_count: i64,
    pub comments_count: i64,

    /// Whether the requesting user currently likes this post.
    pub is_liked: bool,

    /// Up to three most recent likers. Display only.
    pub recent_likers: Vec<UserSummary>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for PostView {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let visibility: String = row.try_get("visibility")?;
        Ok(Self {
            id: row.try_get("id")?,
            author: UserSummary::from_prefixed(row, "author_")?,
            content: row.try_get("content")?,
            image_url: row.try_get("image_url")?,
            visibility: visibility.parse().map_err(|_| sqlx::Error::ColumnDecode {
                index: "visibility".to_string(),
                source: format!("unknown visibility {visibility:?}").into(),
            })?,
            likes_count: row.try_get("likes_count")?,
            comments_count: row.try_get("comments_count")?,
            is_liked: row.try_get("is_liked")?,
            recent_likers: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for creating a new post.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    /// Trimmed and length-checked by the post service.
    pub content: String,

    #[validate(custom(function = validate_image_url))]
    pub image_url: Option<String>,

    /// 'public' (default) or 'private'.
    pub visibility: Option<String>,
}

/// DTO for editing a post. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,

    pub visibility: Option<String>,
}

/// Outcome of a post cascade delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PostDeletion {
    pub post_id: i64,
    pub comments_removed: u64,
    pub likes_removed: u64,
}
