//! Credential hashing and verification.
//!
//! New credentials are stored as bcrypt hashes. Data files written by older
//! deployments may still hold cleartext values; those are compared in constant
//! time until the user changes the credential. bcrypt work runs on the
//! blocking pool so it never stalls the async workers.

use subtle::ConstantTimeEq;

use crate::db::Record;
use crate::errors::AppError;

/// Field holding the user credential in `usuarios` records.
pub const CREDENTIAL_FIELD: &str = "contraseña";

/// Hash a cleartext credential with the given bcrypt cost.
pub async fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    let plain = plain.to_string();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost)).await??;
    Ok(hashed)
}

/// Check a cleartext credential against a stored value (hash or legacy cleartext).
pub async fn verify_password(plain: &str, stored: &str) -> bool {
    if !is_bcrypt_hash(stored) {
        return constant_time_compare(plain, stored);
    }

    let plain = plain.to_string();
    let stored = stored.to_string();
    match tokio::task::spawn_blocking(move || bcrypt::verify(plain, &stored)).await {
        Ok(Ok(valid)) => valid,
        Ok(Err(e)) => {
            tracing::warn!("Stored credential could not be verified: {}", e);
            false
        }
        Err(e) => {
            tracing::error!("Credential verification task failed: {}", e);
            false
        }
    }
}

fn is_bcrypt_hash(value: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Copy of a user record without its credential, for responses.
pub fn without_credential(mut record: Record) -> Record {
    record.shift_remove(CREDENTIAL_FIELD);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("s3cret", 4).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("s3cret", &hash).await);
        assert!(!verify_password("wrong", &hash).await);
    }

    #[tokio::test]
    async fn test_legacy_cleartext_is_compared() {
        assert!(verify_password("1234", "1234").await);
        assert!(!verify_password("1234", "12345").await);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_hashing_leaves_runtime_responsive() {
        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..5 {
                tokio::task::yield_now().await;
                ticks += 1;
            }
            ticks
        });

        let hash = hash_password("s3cret", 10).await.unwrap();
        assert!(ticker.is_finished());
        assert_eq!(ticker.await.unwrap(), 5);
        assert!(verify_password("s3cret", &hash).await);
    }

    #[tokio::test]
    async fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("x", "$2b$garbage").await);
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[test]
    fn test_constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[test]
    fn test_without_credential_strips_only_credential() {
        let record = json!({ "id": "u1", "email": "a@x.com", "contraseña": "x" })
            .as_object()
            .cloned()
            .unwrap();
        let stripped = without_credential(record);
        assert!(stripped.get(CREDENTIAL_FIELD).is_none());
        assert_eq!(stripped["email"], "a@x.com");
        assert_eq!(stripped.keys().next().map(String::as_str), Some("id"));
    }
}
