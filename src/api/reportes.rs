//! Report API endpoints.
//!
//! POST /api/reportes serves two shapes: a JSON body is stored as a free-form
//! report, a multipart form (`placa`, `cui`, `estado`, `photo`) is stored as a
//! photo report after the file is written to the uploads directory.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
};

use super::{created, success, ApiResult, AppJson};
use crate::db::Record;
use crate::errors::AppError;
use crate::models::{require_fields, PhotoReport};
use crate::uploads::save_photo;
use crate::AppState;

/// Name of the multipart field carrying the photo.
const PHOTO_FIELD: &str = "photo";

/// GET /api/reportes - List all reports.
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<Record>> {
    success(state.repo.list_reports().await?)
}

/// POST /api/reportes - Store a JSON report or a multipart photo report.
pub async fn create_report(State(state): State<AppState>, request: Request) -> ApiResult<Record> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        create_photo_report(&state, multipart).await
    } else {
        let AppJson(report) = AppJson::<Record>::from_request(request, &state).await?;
        created(state.repo.create_report(report).await?)
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

async fn create_photo_report(state: &AppState, mut multipart: Multipart) -> ApiResult<Record> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut photo: Option<(Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == PHOTO_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            photo = Some((file_name, bytes));
        } else {
            let text = field.text().await?;
            fields.insert(name, text);
        }
    }

    require_fields(&[
        ("placa", fields.get("placa").map(String::as_str)),
        ("cui", fields.get("cui").map(String::as_str)),
        ("estado", fields.get("estado").map(String::as_str)),
    ])?;
    let (file_name, bytes) = photo
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing required fields: {}", PHOTO_FIELD)))?;

    let photo_path = save_photo(&state.config.uploads_dir, file_name.as_deref(), &bytes).await?;

    let report = PhotoReport {
        plate: fields.remove("placa").unwrap_or_default(),
        cui: fields.remove("cui").unwrap_or_default(),
        status: fields.remove("estado").unwrap_or_default(),
        photo: photo_path,
    };
    created(state.repo.create_photo_report(report).await?)
}
