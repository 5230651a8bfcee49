//! User API endpoints.

use axum::extract::{Path, Query, State};

use super::{created, success, ApiResult, AppJson};
use crate::db::Record;
use crate::errors::AppError;
use crate::models::{
    ChangePasswordRequest, CreateUserRequest, EmailExists, EmailQuery, PasswordResetRequest,
    UserQuery,
};
use crate::AppState;

/// GET /api/usuarios - List users, or the users matching `email` and `contraseña`.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<Record>> {
    match (query.email.as_deref(), query.password.as_deref()) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            success(state.repo.authenticate(email, password).await?)
        }
        _ => success(state.repo.list_users().await?),
    }
}

/// GET /api/usuarios/{id} - Get a single user.
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Record> {
    match state.repo.get_user(&id).await? {
        Some(user) => success(user),
        None => Err(AppError::NotFound(format!("User {} not found", id))),
    }
}

/// POST /api/usuarios - Register a new user.
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> ApiResult<Record> {
    created(state.repo.create_user(request).await?)
}

/// PUT /api/usuarios/{id} - Patch a user.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<Record>,
) -> ApiResult<Record> {
    success(state.repo.update_user(&id, patch).await?)
}

/// DELETE /api/usuarios/{id} - Delete a user.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    success(state.repo.delete_user(&id).await?)
}

/// PUT /api/usuarios/cambiar-contrasena - Change a credential by email.
pub async fn change_password(
    State(state): State<AppState>,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> ApiResult<Record> {
    let user = state
        .repo
        .change_password(request.email.as_deref(), request.new_password.as_deref())
        .await?;
    success(user)
}

/// GET /api/check-email - Whether an email is already registered.
pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<EmailExists> {
    let email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter 'email' is required".to_string()))?;

    success(EmailExists {
        exists: state.repo.email_exists(&email).await?,
    })
}

/// POST /api/request-password-reset - Accept a reset request for an email.
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppJson(request): AppJson<PasswordResetRequest>,
) -> ApiResult<()> {
    state
        .repo
        .request_password_reset(request.email.as_deref())
        .await?;
    success(())
}
