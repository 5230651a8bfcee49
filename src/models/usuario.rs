//! User models matching the `usuarios` collection.

use serde::{Deserialize, Serialize};

use crate::db::Record;

/// Request body for registering a user. Extra profile fields are stored as sent.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "contraseña", alias = "contrasena")]
    pub password: Option<String>,
    #[serde(default, rename = "nombre")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub profile: Record,
}

/// Query parameters for listing users, optionally matching credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "contraseña", alias = "contrasena")]
    pub password: Option<String>,
}

/// Query parameters for the email existence check.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of the email existence check.
#[derive(Debug, Clone, Serialize)]
pub struct EmailExists {
    pub exists: bool,
}

/// Request body for changing a user's credential by email.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "nuevaContrasena", alias = "nuevaContraseña")]
    pub new_password: Option<String>,
}

/// Request body for a password reset.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: Option<String>,
}
