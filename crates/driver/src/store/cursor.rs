use super::{read_snapshot, write_snapshot};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorDocument {
    last_block: u64,
}

/// The [CursorStore] persists the highest fully-processed block of one scanner.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    last_block: Option<u64>,
}

impl CursorStore {
    /// Opens the cursor document at `path`. An absent document leaves the cursor unset.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let last_block = read_snapshot::<CursorDocument>(&path)
            .await?
            .map(|doc| doc.last_block);
        Ok(Self { path, last_block })
    }

    /// The last committed block, if any.
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Commits `block` as fully processed.
    ///
    /// The cursor only moves forward: committing a block at or below the current cursor is a
    /// no-op and does not touch the document.
    pub async fn commit(&mut self, block: u64) -> Result<bool> {
        if self.last_block.is_some_and(|last| block <= last) {
            return Ok(false);
        }
        write_snapshot(&self.path, &CursorDocument { last_block: block }).await?;
        self.last_block = Some(block);
        Ok(true)
    }
}
