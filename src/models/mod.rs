//! Request and response models for the lecturas backend.
//!
//! Wire field names follow the existing data file and frontend (Spanish keys);
//! Rust field names are English and mapped with serde renames.

mod lectura;
mod reporte;
mod rfid;
mod usuario;

pub use lectura::*;
pub use reporte::*;
pub use rfid::*;
pub use usuario::*;

use crate::errors::AppError;

/// Fail with a validation error naming every missing or blank field.
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}
