use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};
use validator::Validate;

use super::{user::UserSummary, validate_image_url};

/// An ephemeral image post.
#[derive(Debug, Clone, Serialize)]
pub struct StoryView {
    pub id: i64,
    pub author: UserSummary,
    pub image_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for StoryView {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            author: UserSummary::from_prefixed(row, "author_")?,
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// DTO for creating a story.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStoryRequest {
    #[validate(
        length(min = 1, message = "Please upload an image"),
        custom(function = validate_image_url)
    )]
    pub image_url: String,
}
