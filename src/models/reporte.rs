//! Incident report models matching the `reportes` collection.

use serde_json::{json, Value};

use crate::db::Record;

/// Driver recorded when the registry entry names none.
pub const UNKNOWN_DRIVER: &str = "Desconocido";

/// Report submitted as a multipart form with a photo.
#[derive(Debug, Clone)]
pub struct PhotoReport {
    pub plate: String,
    pub cui: String,
    pub status: String,
    /// Stored path of the uploaded photo.
    pub photo: String,
}

impl PhotoReport {
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("placa".to_string(), Value::String(self.plate));
        record.insert("cui".to_string(), Value::String(self.cui));
        record.insert("estado".to_string(), Value::String(self.status));
        record.insert("photo".to_string(), Value::String(self.photo));
        record
    }
}

/// Build the report generated for a read of a registered vehicle.
///
/// Vehicle fields the registry entry lacks are left out of the report.
pub fn derived_report(vehicle: &Record, reading: &Record) -> Record {
    let plate = vehicle.get("placa").cloned().unwrap_or(Value::Null);
    let location = reading.get("ubicacion").cloned().unwrap_or(Value::Null);

    let mut report = Record::new();
    report.insert(
        "conductor".to_string(),
        vehicle
            .get("conductor")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| json!(UNKNOWN_DRIVER)),
    );
    report.insert("placa".to_string(), plate.clone());
    for key in ["tipo", "uso"] {
        if let Some(value) = vehicle.get(key) {
            report.insert(key.to_string(), value.clone());
        }
    }
    for key in ["ubicacion", "fecha", "hora"] {
        if let Some(value) = reading.get(key) {
            report.insert(key.to_string(), value.clone());
        }
    }
    report.insert(
        "detalle".to_string(),
        Value::String(format!(
            "Lectura RFID para el vehículo con placa {} registrada en la ubicación {}.",
            display(&plate),
            display(&location)
        )),
    );
    report
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
