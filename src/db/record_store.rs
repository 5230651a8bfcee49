//! Record store over the JSON document.
//!
//! The document is loaded once and kept in memory behind a single async
//! `RwLock`. Every mutation runs on a draft copy while holding the write lock,
//! the draft is persisted with one `save`, and only then replaces the cached
//! document. Writers are therefore totally ordered, and a failed mutation or
//! failed write leaves both the cache and the file as they were.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::RwLock;

use super::document::{field_matches, id_matches, Collection, Document, Record, ID_FIELD};
use crate::errors::AppError;

/// How identifiers are assigned on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Random v4 UUID string.
    #[default]
    Uuid,
    /// 1 + the largest integer id in the collection, or 1 when there is none.
    Sequential,
}

impl IdPolicy {
    /// Produce the identifier for a record about to join `records`.
    pub fn next_id(&self, records: &[Record]) -> Result<Value, AppError> {
        match self {
            IdPolicy::Uuid => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
            IdPolicy::Sequential => {
                let max = records
                    .iter()
                    .filter_map(|r| r.get(ID_FIELD).and_then(Value::as_u64))
                    .max()
                    .unwrap_or(0);
                max.checked_add(1).map(Value::from).ok_or_else(|| {
                    AppError::Internal(format!("Sequential ids exhausted after {}", max))
                })
            }
        }
    }
}

/// JSON-file backed store with per-collection identifier policies.
pub struct RecordStore {
    path: PathBuf,
    document: RwLock<Document>,
    policies: HashMap<Collection, IdPolicy>,
}

impl RecordStore {
    /// Load the document at `path` into a new store.
    pub async fn open(
        path: &Path,
        policies: HashMap<Collection, IdPolicy>,
    ) -> Result<Self, AppError> {
        let document = super::load(path).await?;

        Ok(Self {
            path: path.to_path_buf(),
            document: RwLock::new(document),
            policies,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only closure against the cached document.
    pub async fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Document) -> T,
    {
        let guard = self.document.read().await;
        f(&guard)
    }

    /// Run a mutation as a unit: the closure edits a draft that is saved once
    /// and published only if both the closure and the save succeed.
    pub async fn write<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, AppError>,
    {
        let mut guard = self.document.write().await;
        let mut draft = guard.clone();

        let output = {
            let mut tx = Transaction {
                document: &mut draft,
                policies: &self.policies,
            };
            f(&mut tx)?
        };

        super::save(&self.path, &draft).await?;
        *guard = draft;
        Ok(output)
    }

    // ==================== READS ====================

    /// All records of a collection, in insertion order.
    pub async fn list(&self, collection: Collection) -> Result<Vec<Record>, AppError> {
        self.read(|doc| doc.collection(collection).map(<[Record]>::to_vec))
            .await
    }

    pub async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        self.read(|doc| {
            doc.collection(collection)
                .map(|records| records.iter().find(|r| id_matches(r, id)).cloned())
        })
        .await
    }

    /// First record whose `field` equals `value`.
    pub async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<Record>, AppError> {
        self.read(|doc| {
            doc.collection(collection).map(|records| {
                records
                    .iter()
                    .find(|r| field_matches(r, field, value))
                    .cloned()
            })
        })
        .await
    }

    /// Every record whose `field` equals `value`.
    pub async fn filter_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, AppError> {
        self.read(|doc| {
            doc.collection(collection).map(|records| {
                records
                    .iter()
                    .filter(|r| field_matches(r, field, value))
                    .cloned()
                    .collect()
            })
        })
        .await
    }

    // ==================== WRITES ====================

    pub async fn insert(&self, collection: Collection, partial: Record) -> Result<Record, AppError> {
        self.write(|tx| tx.insert(collection, partial)).await
    }

    pub async fn update_by_id(
        &self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Record, AppError> {
        self.write(|tx| tx.update_by_id(collection, id, patch)).await
    }

    pub async fn update_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
        patch: Record,
    ) -> Result<Record, AppError> {
        self.write(|tx| tx.update_by_field(collection, field, value, patch))
            .await
    }

    pub async fn delete_by_id(&self, collection: Collection, id: &str) -> Result<Record, AppError> {
        self.write(|tx| tx.delete_by_id(collection, id)).await
    }
}

/// Mutable view of the draft document inside [`RecordStore::write`].
pub struct Transaction<'a> {
    document: &'a mut Document,
    policies: &'a HashMap<Collection, IdPolicy>,
}

impl Transaction<'_> {
    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Option<&Record>, AppError> {
        Ok(self
            .document
            .collection(collection)?
            .iter()
            .find(|r| field_matches(r, field, value)))
    }

    /// Append a record with a freshly assigned id. A caller-supplied id is discarded.
    pub fn insert(&mut self, collection: Collection, partial: Record) -> Result<Record, AppError> {
        let policy = self.policies.get(&collection).copied().unwrap_or_default();
        let records = self.document.collection_mut(collection)?;

        let id = policy.next_id(records)?;
        tracing::debug!("Inserting record {} into {}", id, collection);

        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), id);
        record.extend(partial.into_iter().filter(|(k, _)| k != ID_FIELD));

        records.push(record.clone());
        Ok(record)
    }

    /// Shallow-merge `patch` into the record with the given id.
    pub fn update_by_id(
        &mut self,
        collection: Collection,
        id: &str,
        patch: Record,
    ) -> Result<Record, AppError> {
        let record = self
            .document
            .collection_mut(collection)?
            .iter_mut()
            .find(|r| id_matches(r, id))
            .ok_or_else(|| not_found(collection, id))?;

        merge(record, patch);
        Ok(record.clone())
    }

    /// Shallow-merge `patch` into the first record whose `field` equals `value`.
    pub fn update_by_field(
        &mut self,
        collection: Collection,
        field: &str,
        value: &Value,
        patch: Record,
    ) -> Result<Record, AppError> {
        let record = self
            .document
            .collection_mut(collection)?
            .iter_mut()
            .find(|r| field_matches(r, field, value))
            .ok_or_else(|| {
                AppError::NotFound(format!("No record in {} with {} = {}", collection, field, value))
            })?;

        merge(record, patch);
        Ok(record.clone())
    }

    pub fn delete_by_id(&mut self, collection: Collection, id: &str) -> Result<Record, AppError> {
        let records = self.document.collection_mut(collection)?;
        let index = records
            .iter()
            .position(|r| id_matches(r, id))
            .ok_or_else(|| not_found(collection, id))?;

        Ok(records.remove(index))
    }
}

/// Patch fields overwrite same-named fields; the id is never rewritten.
fn merge(record: &mut Record, patch: Record) {
    for (key, value) in patch {
        if key != ID_FIELD {
            record.insert(key, value);
        }
    }
}

fn not_found(collection: Collection, id: &str) -> AppError {
    AppError::NotFound(format!("Record {} not found in {}", id, collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn open_store(dir: &TempDir, contents: Value, policies: HashMap<Collection, IdPolicy>) -> RecordStore {
        let path = dir.path().join("db.json");
        std::fs::write(&path, serde_json::to_vec(&contents).unwrap()).unwrap();
        RecordStore::open(&path, policies).await.unwrap()
    }

    fn sequential(collection: Collection) -> HashMap<Collection, IdPolicy> {
        HashMap::from([(collection, IdPolicy::Sequential)])
    }

    #[tokio::test]
    async fn test_insert_then_find_by_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), HashMap::new()).await;

        let inserted = store
            .insert(Collection::Usuarios, record(json!({ "email": "a@x.com", "nombre": "Ana" })))
            .await
            .unwrap();

        let id = inserted["id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());

        let found = store.find_by_id(Collection::Usuarios, id).await.unwrap().unwrap();
        assert_eq!(found, inserted);
        assert_eq!(found["email"], "a@x.com");
        assert_eq!(found["nombre"], "Ana");
        assert_eq!(found.keys().next().map(String::as_str), Some("id"));
    }

    #[tokio::test]
    async fn test_insert_discards_caller_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), sequential(Collection::Reportes)).await;

        let inserted = store
            .insert(Collection::Reportes, record(json!({ "id": 99, "placa": "P1" })))
            .await
            .unwrap();

        assert_eq!(inserted["id"], 1);
    }

    #[tokio::test]
    async fn test_sequential_ids_follow_max() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "reportes": [{ "id": 4 }, { "id": "legacy" }, { "id": 2 }] }),
            sequential(Collection::Reportes),
        )
        .await;

        let inserted = store
            .insert(Collection::Reportes, record(json!({ "placa": "P1" })))
            .await
            .unwrap();
        assert_eq!(inserted["id"], 5);

        let by_int = store.find_by_id(Collection::Reportes, "5").await.unwrap();
        assert!(by_int.is_some());
    }

    #[tokio::test]
    async fn test_sequential_ids_start_at_one() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), sequential(Collection::Lecturas)).await;

        let first = store.insert(Collection::Lecturas, Record::new()).await.unwrap();
        let second = store.insert(Collection::Lecturas, Record::new()).await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
    }

    #[tokio::test]
    async fn test_delete_then_find_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), HashMap::new()).await;
        let inserted = store
            .insert(Collection::Usuarios, record(json!({ "email": "a@x.com" })))
            .await
            .unwrap();
        let id = inserted["id"].as_str().unwrap().to_string();

        let removed = store.delete_by_id(Collection::Usuarios, &id).await.unwrap();
        assert_eq!(removed, inserted);
        assert!(store.find_by_id(Collection::Usuarios, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_shallowly() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "usuarios": [{ "id": "u1", "email": "a@x.com", "nombre": "Ana", "rol": "admin" }] }),
            HashMap::new(),
        )
        .await;

        let updated = store
            .update_by_id(
                Collection::Usuarios,
                "u1",
                record(json!({ "id": "hijack", "nombre": "Ana María", "telefono": "555" })),
            )
            .await
            .unwrap();

        assert_eq!(updated["id"], "u1");
        assert_eq!(updated["nombre"], "Ana María");
        assert_eq!(updated["telefono"], "555");
        assert_eq!(updated["email"], "a@x.com");
        assert_eq!(updated["rol"], "admin");
        assert_eq!(
            store.find_by_id(Collection::Usuarios, "u1").await.unwrap().unwrap(),
            updated
        );
    }

    #[tokio::test]
    async fn test_missing_id_leaves_collection_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "usuarios": [{ "id": "u1", "email": "a@x.com" }] }),
            HashMap::new(),
        )
        .await;
        let before = store.list(Collection::Usuarios).await.unwrap();
        let file_before = std::fs::read(store.path()).unwrap();

        let err = store
            .update_by_id(Collection::Usuarios, "nope", record(json!({ "email": "b@x.com" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = store.delete_by_id(Collection::Usuarios, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(store.list(Collection::Usuarios).await.unwrap(), before);
        assert_eq!(std::fs::read(store.path()).unwrap(), file_before);
    }

    #[tokio::test]
    async fn test_update_by_field() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "rfid": [{ "placa": "P123", "estado": "activo" }] }),
            HashMap::new(),
        )
        .await;

        let updated = store
            .update_by_field(
                Collection::Rfid,
                "placa",
                &json!("P123"),
                record(json!({ "estado": "robado" })),
            )
            .await
            .unwrap();
        assert_eq!(updated["estado"], "robado");

        let err = store
            .update_by_field(Collection::Rfid, "placa", &json!("Z9"), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_and_filter_by_field() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "lecturas": [
                { "id": 1, "placa": "P1" },
                { "id": 2, "placa": "P2" },
                { "id": 3, "placa": "P1" }
            ] }),
            HashMap::new(),
        )
        .await;

        let first = store
            .find_by_field(Collection::Lecturas, "placa", &json!("P1"))
            .await
            .unwrap();
        assert_eq!(first.unwrap()["id"], 1);
        let all = store
            .filter_by_field(Collection::Lecturas, "placa", &json!("P1"))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(store
            .find_by_field(Collection::Lecturas, "placa", &json!("P9"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_writes_are_persisted() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), HashMap::new()).await;
        let inserted = store
            .insert(Collection::Reportes, record(json!({ "placa": "P1" })))
            .await
            .unwrap();

        let reopened = RecordStore::open(store.path(), HashMap::new()).await.unwrap();
        assert_eq!(reopened.list(Collection::Reportes).await.unwrap(), vec![inserted]);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_whole_transaction() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({}), HashMap::new()).await;

        let result: Result<(), AppError> = store
            .write(|tx| {
                tx.insert(Collection::Lecturas, record(json!({ "placa": "P1" })))?;
                Err(AppError::VehicleNotFound("P1".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::VehicleNotFound(_))));
        assert!(store.list(Collection::Lecturas).await.unwrap().is_empty());
        let on_disk = crate::db::load(store.path()).await.unwrap();
        assert!(on_disk.collection(Collection::Lecturas).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_cache_consistent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, json!({ "reportes": [] }), HashMap::new()).await;

        // Replace the backing file with a directory so the rename fails
        std::fs::remove_file(store.path()).unwrap();
        std::fs::create_dir(store.path()).unwrap();
        std::fs::write(store.path().join("keep"), "x").unwrap();

        let err = store
            .insert(Collection::Reportes, record(json!({ "placa": "P1" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(store.list(Collection::Reportes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_serialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir, json!({}), sequential(Collection::Lecturas)).await);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(Collection::Lecturas, record(json!({ "n": i })))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut ids: Vec<u64> = store
            .list(Collection::Lecturas)
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());

        let on_disk = crate::db::load(store.path()).await.unwrap();
        assert_eq!(on_disk.collection(Collection::Lecturas).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_sequential_id_overflow_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({ "reportes": [{ "id": u64::MAX }] }),
            sequential(Collection::Reportes),
        )
        .await;
        let file_before = std::fs::read(store.path()).unwrap();

        let err = store
            .insert(Collection::Reportes, record(json!({ "placa": "P1" })))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.list(Collection::Reportes).await.unwrap().len(), 1);
        assert_eq!(std::fs::read(store.path()).unwrap(), file_before);
    }

    #[tokio::test]
    async fn test_malformed_collection_fails_only_its_own_operations() {
        let dir = TempDir::new().unwrap();
        let store = open_store(
            &dir,
            json!({
                "usuarios": [{ "id": "u1", "email": "a@x.com" }],
                "lecturas": null,
                "reportes": { "not": "a list" },
                "meta": { "version": 1 }
            }),
            HashMap::new(),
        )
        .await;

        assert_eq!(store.list(Collection::Usuarios).await.unwrap().len(), 1);
        assert!(store.list(Collection::Lecturas).await.unwrap().is_empty());
        assert!(matches!(
            store.list(Collection::Reportes).await,
            Err(AppError::CorruptDocument(_))
        ));
        assert!(matches!(
            store.insert(Collection::Reportes, Record::new()).await,
            Err(AppError::CorruptDocument(_))
        ));

        store
            .insert(Collection::Lecturas, record(json!({ "placa": "P1" })))
            .await
            .unwrap();
        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["meta"], json!({ "version": 1 }));
        assert_eq!(on_disk["reportes"], json!({ "not": "a list" }));
        assert_eq!(on_disk["lecturas"].as_array().unwrap().len(), 1);
    }
}
