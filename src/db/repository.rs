//! Domain operations over the record store.
//!
//! Every operation is either a single store call or a single `write`
//! transaction, so composite changes reach the file with one save.

use serde_json::{json, Value};

use super::document::{field_matches, id_matches, Collection, Record, ID_FIELD};
use super::record_store::RecordStore;
use crate::auth::{hash_password, verify_password, without_credential, CREDENTIAL_FIELD};
use crate::errors::AppError;
use crate::models::{
    derived_report, require_fields, CreateReadingRequest, CreateUserRequest, PhotoReport,
    ReadingWithReport,
};

/// Repository for all data operations.
pub struct Repository {
    store: RecordStore,
    bcrypt_cost: u32,
}

impl Repository {
    pub fn new(store: RecordStore, bcrypt_cost: u32) -> Self {
        Self { store, bcrypt_cost }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    // ==================== USER OPERATIONS ====================

    /// List all users, without credentials.
    pub async fn list_users(&self) -> Result<Vec<Record>, AppError> {
        let users = self.store.list(Collection::Usuarios).await?;
        Ok(users.into_iter().map(without_credential).collect())
    }

    /// Users whose email and credential both match.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Vec<Record>, AppError> {
        let candidates = self
            .store
            .filter_by_field(Collection::Usuarios, "email", &json!(email))
            .await?;

        let mut matched = Vec::new();
        for user in candidates {
            let valid = match user.get(CREDENTIAL_FIELD).and_then(Value::as_str) {
                Some(stored) => verify_password(password, stored).await,
                None => false,
            };
            if valid {
                matched.push(without_credential(user));
            }
        }
        Ok(matched)
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<Record>, AppError> {
        let user = self.store.find_by_id(Collection::Usuarios, id).await?;
        Ok(user.map(without_credential))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let user = self
            .store
            .find_by_field(Collection::Usuarios, "email", &json!(email))
            .await?;
        Ok(user.is_some())
    }

    /// Register a new user. The email must not be registered yet.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<Record, AppError> {
        require_fields(&[
            ("email", request.email.as_deref()),
            (CREDENTIAL_FIELD, request.password.as_deref()),
            ("nombre", request.name.as_deref()),
        ])?;

        let CreateUserRequest {
            email,
            password,
            name,
            profile,
        } = request;
        let email = email.unwrap_or_default();
        let hashed = hash_password(&password.unwrap_or_default(), self.bcrypt_cost).await?;

        let mut record = Record::new();
        record.insert("email".to_string(), json!(email));
        record.insert(CREDENTIAL_FIELD.to_string(), json!(hashed));
        record.insert("nombre".to_string(), json!(name));
        record.extend(profile);

        let user = self
            .store
            .write(|tx| {
                if tx
                    .find_by_field(Collection::Usuarios, "email", &json!(email))?
                    .is_some()
                {
                    return Err(AppError::Validation(format!(
                        "Email {} is already registered",
                        email
                    )));
                }
                tx.insert(Collection::Usuarios, record)
            })
            .await?;

        tracing::info!("Registered user {}", user[ID_FIELD]);
        Ok(without_credential(user))
    }

    /// Shallow-patch a user. A new credential is hashed; a new email must be free.
    pub async fn update_user(&self, id: &str, mut patch: Record) -> Result<Record, AppError> {
        match patch.get(CREDENTIAL_FIELD) {
            Some(Value::String(plain)) => {
                let hashed = hash_password(plain, self.bcrypt_cost).await?;
                patch.insert(CREDENTIAL_FIELD.to_string(), Value::String(hashed));
            }
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "{} must be a string",
                    CREDENTIAL_FIELD
                )))
            }
            None => {}
        }

        let user = self
            .store
            .write(|tx| {
                if let Some(email) = patch.get("email") {
                    let taken = tx
                        .document()
                        .collection(Collection::Usuarios)?
                        .iter()
                        .any(|r| field_matches(r, "email", email) && !id_matches(r, id));
                    if taken {
                        return Err(AppError::Validation(format!(
                            "Email {} is already registered",
                            email
                        )));
                    }
                }
                tx.update_by_id(Collection::Usuarios, id, patch)
            })
            .await
            .map_err(|e| user_not_found(e, id))?;

        tracing::info!("Updated user {}", id);
        Ok(without_credential(user))
    }

    /// Delete a user, returning the removed record.
    pub async fn delete_user(&self, id: &str) -> Result<Record, AppError> {
        let user = self
            .store
            .delete_by_id(Collection::Usuarios, id)
            .await
            .map_err(|e| user_not_found(e, id))?;

        tracing::info!("Deleted user {}", id);
        Ok(without_credential(user))
    }

    /// Replace the credential of the user registered under `email`.
    pub async fn change_password(
        &self,
        email: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<Record, AppError> {
        require_fields(&[("email", email), ("nuevaContrasena", new_password)])?;
        let email = email.unwrap_or_default();
        let hashed = hash_password(new_password.unwrap_or_default(), self.bcrypt_cost).await?;

        let mut patch = Record::new();
        patch.insert(CREDENTIAL_FIELD.to_string(), Value::String(hashed));

        let user = self
            .store
            .update_by_field(Collection::Usuarios, "email", &json!(email), patch)
            .await
            .map_err(|e| user_not_found(e, email))?;

        tracing::info!("Changed credential of user {}", email);
        Ok(without_credential(user))
    }

    /// Accept a password reset request. No mail transport is wired; the
    /// request is only logged, and the outcome never reveals whether the email exists.
    pub async fn request_password_reset(&self, email: Option<&str>) -> Result<(), AppError> {
        require_fields(&[("email", email)])?;
        let email = email.unwrap_or_default();

        if self.email_exists(email).await? {
            tracing::info!("Password reset requested for {}", email);
        } else {
            tracing::debug!("Password reset requested for unknown email");
        }
        Ok(())
    }

    // ==================== READING OPERATIONS ====================

    pub async fn list_readings(&self) -> Result<Vec<Record>, AppError> {
        self.store.list(Collection::Lecturas).await
    }

    /// Store a read and the report derived from it in one save.
    ///
    /// The plate is looked up in the `rfid` registry, then in the historical
    /// `vehiculos` registry. When neither knows it, nothing is written.
    pub async fn create_reading_with_report(
        &self,
        request: CreateReadingRequest,
    ) -> Result<ReadingWithReport, AppError> {
        require_fields(&[
            ("placa", request.plate.as_deref()),
            ("ubicacion", request.location.as_deref()),
            ("fecha", request.date.as_deref()),
            ("hora", request.time.as_deref()),
        ])?;

        let plate = request.plate.clone().unwrap_or_default();
        let plate_value = json!(plate);
        let reading = request.into_record();

        let created = self
            .store
            .write(|tx| {
                let vehicle = match tx.find_by_field(Collection::Rfid, "placa", &plate_value)? {
                    Some(vehicle) => vehicle.clone(),
                    None => tx
                        .find_by_field(Collection::Vehiculos, "placa", &plate_value)?
                        .cloned()
                        .ok_or_else(|| vehicle_not_found(&plate))?,
                };

                let lectura = tx.insert(Collection::Lecturas, reading)?;
                let reporte = tx.insert(Collection::Reportes, derived_report(&vehicle, &lectura))?;
                Ok(ReadingWithReport { lectura, reporte })
            })
            .await?;

        tracing::info!(
            "Stored read {} and report {} for plate {}",
            created.lectura[ID_FIELD],
            created.reporte[ID_FIELD],
            plate
        );
        Ok(created)
    }

    // ==================== REPORT OPERATIONS ====================

    pub async fn list_reports(&self) -> Result<Vec<Record>, AppError> {
        self.store.list(Collection::Reportes).await
    }

    /// Store a free-form report as sent.
    pub async fn create_report(&self, report: Record) -> Result<Record, AppError> {
        let report = self.store.insert(Collection::Reportes, report).await?;
        tracing::info!("Stored report {}", report[ID_FIELD]);
        Ok(report)
    }

    /// Store a report whose photo has already been written to the uploads directory.
    pub async fn create_photo_report(&self, report: PhotoReport) -> Result<Record, AppError> {
        let report = self
            .store
            .insert(Collection::Reportes, report.into_record())
            .await?;
        tracing::info!("Stored photo report {}", report[ID_FIELD]);
        Ok(report)
    }

    // ==================== REGISTRY OPERATIONS ====================

    pub async fn find_vehicle(&self, plate: &str) -> Result<Option<Record>, AppError> {
        self.store
            .find_by_field(Collection::Rfid, "placa", &json!(plate))
            .await
    }

    pub async fn update_vehicle_status(
        &self,
        plate: Option<&str>,
        status: Option<&str>,
    ) -> Result<Record, AppError> {
        require_fields(&[("placa", plate), ("estado", status)])?;
        let plate = plate.unwrap_or_default();

        let mut patch = Record::new();
        patch.insert("estado".to_string(), json!(status));

        let vehicle = self
            .store
            .update_by_field(Collection::Rfid, "placa", &json!(plate), patch)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => vehicle_not_found(plate),
                other => other,
            })?;

        tracing::info!("Vehicle {} status set to {}", plate, vehicle["estado"]);
        Ok(vehicle)
    }
}

fn vehicle_not_found(plate: &str) -> AppError {
    AppError::VehicleNotFound(format!("Vehicle with plate {} not found", plate))
}

fn user_not_found(err: AppError, key: &str) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::NotFound(format!("User {} not found", key)),
        other => other,
    }
}
