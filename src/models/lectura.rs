//! RFID read models matching the `lecturas` collection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Record;

/// Request body for registering an RFID read.
///
/// Only plate, location, date and time are required. Any vehicle/owner snapshot
/// fields sent along (uso, tipo, linea, chasis, nombre, cui, fotoVehiculo, ...)
/// are stored with the read unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReadingRequest {
    #[serde(default, rename = "placa")]
    pub plate: Option<String>,
    #[serde(default, rename = "ubicacion")]
    pub location: Option<String>,
    #[serde(default, rename = "fecha")]
    pub date: Option<String>,
    #[serde(default, rename = "hora")]
    pub time: Option<String>,
    #[serde(flatten)]
    pub snapshot: Record,
}

impl CreateReadingRequest {
    /// Record to insert into `lecturas`: required fields first, then the snapshot.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        let required = [
            ("placa", self.plate),
            ("ubicacion", self.location),
            ("fecha", self.date),
            ("hora", self.time),
        ];
        for (key, value) in required {
            if let Some(value) = value {
                record.insert(key.to_string(), Value::String(value));
            }
        }
        record.extend(self.snapshot);
        record
    }
}

/// A stored read together with the report derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingWithReport {
    pub lectura: Record,
    pub reporte: Record,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_record_keeps_snapshot() {
        let request: CreateReadingRequest = serde_json::from_value(json!({
            "placa": "P123",
            "ubicacion": "Gate1",
            "fecha": "2024-01-01",
            "hora": "08:00",
            "color": "rojo",
            "cui": "1234567890101"
        }))
        .unwrap();

        let record = request.into_record();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["placa", "ubicacion", "fecha", "hora", "color", "cui"]);
        assert_eq!(record["color"], "rojo");
    }
}
