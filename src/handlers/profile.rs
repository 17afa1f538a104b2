use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::user::UpdateProfileRequest,
    services::users,
    utils::jwt::AuthUser,
};

/// Get current user's profile.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let me = users::get_user(&pool, &user.id).await?;
    Ok(Json(me))
}

/// Update current user's display name or picture.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let me = users::update_profile(&pool, &user.id, payload).await?;
    Ok(Json(me))
}
