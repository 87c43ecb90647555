//! The store module contains the persisted documents of the mirror. Every document is a
//! full snapshot, replaced atomically on write.

mod cursor;
pub use cursor::CursorStore;

mod records;
pub use records::{FileRecordStore, MemoryRecordStore, RecordGate, RecordRepository};

mod ownership;
pub use ownership::{OwnedAsset, OwnershipCache};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{io::ErrorKind, path::Path};

/// Reads the JSON document at `path`, returning `None` if it does not exist yet.
pub async fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt snapshot at {}", path.display()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Error reading {}", path.display())),
    }
}

/// Replaces the JSON document at `path` with `value`.
///
/// The document is written to a sibling temporary file and renamed over the target, so a
/// failed write leaves the previous snapshot intact.
pub async fn write_snapshot<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    tokio::fs::write(&staging, &bytes)
        .await
        .with_context(|| format!("Error writing {}", path.display()))?;
    tokio::fs::rename(&staging, path)
        .await
        .with_context(|| format!("Error replacing {}", path.display()))?;
    Ok(())
}
