use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::like::{TargetType, ToggleLikeRequest},
    services::likes,
    utils::jwt::AuthUser,
};

/// Toggle the current user's like on a post or comment.
pub async fn toggle_like(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ToggleLikeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let target_type: TargetType = payload.target_type.parse()?;

    let toggle = likes::toggle_like(&pool, &user.id, target_type, payload.target_id).await?;
    Ok(Json(toggle))
}

pub async fn get_likes(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path((target_type, target_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let target_type: TargetType = target_type.parse()?;

    let summary = likes::get_likes(&pool, &user.id, target_type, target_id).await?;
    Ok(Json(summary))
}
