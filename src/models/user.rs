// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};
use validator::Validate;

use super::validate_image_url;

/// Represents the 'users' table: the local projection of an externally authenticated user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Opaque subject id issued by the auth provider.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub profile_picture: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Author / liker projection embedded in other responses.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: String,
}

impl UserSummary {
    /// Reads a summary from columns named `{prefix}id`, `{prefix}first_name`, ...
    ///
    /// Queries LEFT JOIN `users`, so a missing projection decodes as an anonymous "User".
    pub(crate) fn from_prefixed(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let column = |name: &str| format!("{prefix}{name}");
        Ok(Self {
            id: row.try_get(column("id").as_str())?,
            first_name: row
                .try_get::<Option<String>, _>(column("first_name").as_str())?
                .unwrap_or_else(|| "User".to_string()),
            last_name: row
                .try_get::<Option<String>, _>(column("last_name").as_str())?
                .unwrap_or_default(),
            profile_picture: row
                .try_get::<Option<String>, _>(column("profile_picture").as_str())?
                .unwrap_or_default(),
        })
    }
}

/// Profile fields used when a user is first seen.
#[derive(Debug, Clone, Default)]
pub struct NewUserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub profile_picture: String,
}

impl NewUserProfile {
    /// Splits a display name the way the client renders it: first word, then the rest.
    pub fn from_display_name(name: Option<&str>, email: Option<String>, picture: Option<String>) -> Self {
        let mut parts = name.unwrap_or_default().split_whitespace();
        let first_name = parts.next().unwrap_or("User").to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");
        Self {
            first_name,
            last_name,
            email,
            profile_picture: picture.unwrap_or_default(),
        }
    }
}

/// DTO for updating the caller's own profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be between 1 and 50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 50, message = "Last name must be at most 50 characters"))]
    pub last_name: Option<String>,

    #[validate(custom(function = validate_image_url))]
    pub profile_picture: Option<String>,
}
