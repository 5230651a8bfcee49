//! Vehicle registry models matching the `rfid` collection.

use serde::Deserialize;

/// Query parameters for a registry lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct PlateQuery {
    #[serde(default, rename = "placa")]
    pub plate: Option<String>,
}

/// Request body for a vehicle status change.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default, rename = "placa")]
    pub plate: Option<String>,
    #[serde(default, rename = "estado")]
    pub status: Option<String>,
}
