//! RFID read API endpoints.

use axum::extract::State;

use super::{created, success, ApiResult, AppJson};
use crate::db::Record;
use crate::models::{CreateReadingRequest, ReadingWithReport};
use crate::AppState;

/// GET /api/lecturas - List all reads.
pub async fn list_readings(State(state): State<AppState>) -> ApiResult<Vec<Record>> {
    success(state.repo.list_readings().await?)
}

/// POST /api/lecturas - Store a read and its derived report.
pub async fn create_reading(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateReadingRequest>,
) -> ApiResult<ReadingWithReport> {
    created(state.repo.create_reading_with_report(request).await?)
}
