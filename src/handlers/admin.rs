// src/handlers/admin.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{error::AppError, services::counters};

/// Lists every stored counter that disagrees with its source records.
/// Admin only.
pub async fn counter_drift(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let drift = counters::find_drift(&pool).await?;

    Ok(Json(json!({
        "drift": drift,
        "count": drift.len(),
    })))
}

/// Rebuilds all counters from source records.
/// Admin only.
pub async fn reconcile_counters(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let report = counters::reconcile(&pool).await?;

    Ok(Json(json!({
        "message": "Counters reconciled",
        "report": report,
        "corrected": report.total(),
    })))
}
