//! Photo storage for multipart reports.
//!
//! Files land in a local directory under `{unix_millis}-{random}-{client basename}`;
//! only the resulting path is persisted in the document. A stored file is never
//! overwritten.

use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::AppError;

const FALLBACK_NAME: &str = "photo";

/// Fresh names tried before giving up on a crowded directory.
const MAX_ATTEMPTS: usize = 8;

/// Write an uploaded photo and return its stored path.
pub async fn save_photo(
    dir: &Path,
    original_name: Option<&str>,
    bytes: &[u8],
) -> Result<String, AppError> {
    fs::create_dir_all(dir).await?;
    let base = basename(original_name.unwrap_or(FALLBACK_NAME));

    for _ in 0..MAX_ATTEMPTS {
        let path = dir.join(unique_name(base));
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_all(&mut file, bytes).await {
            drop(file);
            fs::remove_file(&path).await.ok();
            return Err(e.into());
        }

        tracing::debug!("Stored upload {:?} ({} bytes)", path, bytes.len());
        return Ok(path.display().to_string());
    }

    Err(AppError::Storage(format!(
        "Could not find a free name for {} in {}",
        base,
        dir.display()
    )))
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn unique_name(base: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", Utc::now().timestamp_millis(), &token[..8], base)
}

/// Last path component of a client-supplied name, never empty or a dot entry.
fn basename(name: &str) -> &str {
    match name.rsplit(['/', '\\']).next().map(str::trim) {
        Some(base) if !base.is_empty() && base != "." && base != ".." => base,
        _ => FALLBACK_NAME,
    }
}
