use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::story::CreateStoryRequest,
    services::stories,
    state::AppState,
    utils::jwt::AuthUser,
};

/// Stories that have not expired yet (newest first).
pub async fn list_stories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stories = stories::list_stories(&state.pool, state.config.story_ttl()).await?;

    Ok(Json(json!({ "stories": stories })))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let story = stories::create_story(&state.pool, &user.id, payload).await?;

    Ok((StatusCode::CREATED, Json(story)))
}
