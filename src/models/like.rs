// src/models/like.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::UserSummary;
use crate::error::AppError;

/// What a like points at. Stored as `'Post'` / `'Comment'` in `likes.target_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Post => "Post",
            TargetType::Comment => "Comment",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Post" => Ok(TargetType::Post),
            "Comment" => Ok(TargetType::Comment),
            _ => Err(AppError::BadRequest("Invalid target type".to_string())),
        }
    }
}

/// DTO for `POST /api/likes/toggle`.
/// `target_type` stays a string so an unknown value is a 400 rather than a JSON rejection.
#[derive(Debug, Deserialize, Validate)]
pub struct ToggleLikeRequest {
    #[validate(length(min = 1, max = 16))]
    pub target_type: String,
    #[validate(range(min = 1, message = "Target ID is required"))]
    pub target_id: i64,
}

/// Result of a toggle: the caller's new state plus the authoritative aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct LikeToggle {
    pub is_liked: bool,
    pub likes_count: i64,
    /// Current likers, most recent first.
    pub liked_by: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikesSummary {
    pub likes_count: i64,
    pub is_liked: bool,
    pub liked_by: Vec<UserSummary>,
}
