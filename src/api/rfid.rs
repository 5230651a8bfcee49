//! Vehicle registry API endpoints.

use axum::extract::{Query, State};

use super::{success, ApiResult, AppJson};
use crate::db::Record;
use crate::errors::AppError;
use crate::models::{PlateQuery, UpdateStatusRequest};
use crate::AppState;

/// GET /api/rfid?placa= - Look up a vehicle by plate.
pub async fn get_vehicle(
    State(state): State<AppState>,
    Query(query): Query<PlateQuery>,
) -> ApiResult<Record> {
    let plate = query
        .plate
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter 'placa' is required".to_string()))?;

    match state.repo.find_vehicle(&plate).await? {
        Some(vehicle) => success(vehicle),
        None => Err(AppError::VehicleNotFound(format!(
            "Vehicle with plate {} not found",
            plate
        ))),
    }
}

/// PUT /api/rfid/estado - Change a vehicle's status.
pub async fn update_vehicle_status(
    State(state): State<AppState>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> ApiResult<Record> {
    let vehicle = state
        .repo
        .update_vehicle_status(request.plate.as_deref(), request.status.as_deref())
        .await?;
    success(vehicle)
}
