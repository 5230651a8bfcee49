//! JSON document persistence.
//!
//! A single JSON file is the source of truth for all application data. It is
//! always rewritten whole, through a temp file and a rename, so a crash mid-write
//! never leaves a truncated document behind.

mod document;
mod record_store;
mod repository;

pub use document::*;
pub use record_store::*;
pub use repository::*;

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::AppError;

/// Ensure the backing file exists, creating an empty document if it is missing.
pub async fn init_store(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    if !fs::try_exists(path).await? {
        tracing::info!("Creating empty document at {:?}", path);
        save(path, &Document::default()).await?;
    }

    Ok(())
}

/// Read and parse the whole document.
pub async fn load(path: &Path) -> Result<Document, AppError> {
    let bytes = fs::read(path).await.map_err(|e| {
        tracing::error!("Failed to read document {:?}: {:?}", path, e);
        AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!("Failed to parse document {:?}: {:?}", path, e);
        AppError::CorruptDocument(format!("Invalid document {}: {}", path.display(), e))
    })
}

/// Serialize the whole document and atomically replace the backing file.
pub async fn save(path: &Path, document: &Document) -> Result<(), AppError> {
    let data = serde_json::to_vec_pretty(document)
        .map_err(|e| AppError::Internal(format!("Failed to serialize document: {}", e)))?;

    let tmp = temp_path(path);
    if let Err(e) = write_and_replace(&tmp, path, &data).await {
        tracing::error!("Failed to write document {:?}: {:?}", path, e);
        fs::remove_file(&tmp).await.ok();
        return Err(AppError::Storage(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

async fn write_and_replace(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("db.json");
    path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()))
}
