use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        page::PageParams,
        post::{CreatePostRequest, UpdatePostRequest},
    },
    services::posts,
    utils::jwt::AuthUser,
};

/// Feed for the current user (public posts plus their own private ones).
pub async fn list_feed(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = posts::list_feed(&pool, &user.id, params).await?;

    Ok(Json(json!({
        "posts": page.items,
        "pagination": page.pagination,
    })))
}

pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::create_post(&pool, &user.id, payload).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::get_post(&pool, &user.id, id).await?;
    Ok(Json(post))
}

/// Edit a post.
/// Requires: Author.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = posts::update_post(&pool, &user.id, id, payload).await?;
    Ok(Json(post))
}

/// Delete a post together with its comments and likes (Soft Delete).
/// Requires: Author.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deletion = posts::delete_post(&pool, &user.id, id).await?;

    Ok(Json(json!({
        "message": "Post deleted successfully",
        "deleted": deletion,
    })))
}
