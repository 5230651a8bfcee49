//! In-memory shape of the persisted JSON document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// One entry of a collection. Field order is preserved on disk.
pub type Record = Map<String, Value>;

/// Name of the identifier field carried by every record.
pub const ID_FIELD: &str = "id";

/// The collections known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Usuarios,
    Lecturas,
    Reportes,
    Rfid,
    /// Historical vehicle registry, only read as a fallback for plate lookups.
    Vehiculos,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Usuarios,
        Collection::Lecturas,
        Collection::Reportes,
        Collection::Rfid,
        Collection::Vehiculos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Usuarios => "usuarios",
            Collection::Lecturas => "lecturas",
            Collection::Reportes => "reportes",
            Collection::Rfid => "rfid",
            Collection::Vehiculos => "vehiculos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of one top-level key of the document.
///
/// Arrays of objects parse as records; anything else is kept verbatim so it
/// is written back exactly as found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Slot {
    Records(Vec<Record>),
    Raw(Value),
}

/// The entire persisted state: top-level key to ordered records.
///
/// Keys the backend does not know are kept and written back untouched. A
/// collection holding something other than an array of objects (or `null`)
/// only fails when that collection is accessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    collections: BTreeMap<String, Slot>,
}

impl Document {
    /// Records of a collection; an absent or `null` collection reads as empty.
    pub fn collection(&self, collection: Collection) -> Result<&[Record], AppError> {
        match self.collections.get(collection.as_str()) {
            None | Some(Slot::Raw(Value::Null)) => Ok(&[]),
            Some(Slot::Records(records)) => Ok(records),
            Some(Slot::Raw(other)) => Err(malformed(collection, other)),
        }
    }

    /// Mutable records of a collection, created empty on first access.
    pub fn collection_mut(&mut self, collection: Collection) -> Result<&mut Vec<Record>, AppError> {
        let slot = self
            .collections
            .entry(collection.as_str().to_string())
            .or_insert_with(|| Slot::Records(Vec::new()));
        if matches!(slot, Slot::Raw(Value::Null)) {
            *slot = Slot::Records(Vec::new());
        }

        match slot {
            Slot::Records(records) => Ok(records),
            Slot::Raw(other) => Err(malformed(collection, other)),
        }
    }

    /// Names of the top-level keys physically present in the document.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

fn malformed(collection: Collection, value: &Value) -> AppError {
    let kind = match value {
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array with non-object entries",
        Value::Object(_) => "an object",
        Value::Null => "null",
    };
    AppError::CorruptDocument(format!(
        "Collection {} holds {}, expected an array of records",
        collection, kind
    ))
}

/// Identifier equality: string ids compare verbatim, integer ids by their decimal form.
pub fn id_matches(record: &Record, id: &str) -> bool {
    match record.get(ID_FIELD) {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

/// Field equality used by plate, email and credential lookups.
pub fn field_matches(record: &Record, field: &str, value: &Value) -> bool {
    record.get(field) == Some(value)
}
