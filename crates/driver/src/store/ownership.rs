use super::{read_snapshot, write_snapshot};
use crate::types::normalize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};
use tokio::sync::Mutex;

/// A single held asset, as previously observed for a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedAsset {
    pub token_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// wallet -> collection -> assets
type Holdings = BTreeMap<String, BTreeMap<String, Vec<OwnedAsset>>>;

/// The [OwnershipCache] remembers the assets each wallet was last seen holding.
///
/// A missing entry means "re-derive from the ledger", never "owns nothing". Entries are
/// dropped whenever a transfer touches the wallet. Wallets are keyed by their lower-cased
/// address, whatever casing the caller passes.
#[derive(Debug)]
pub struct OwnershipCache {
    path: PathBuf,
    entries: Mutex<Holdings>,
}

impl OwnershipCache {
    /// Loads the ownership document at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_snapshot(&path).await?.unwrap_or_default();
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The cached holdings of `wallet`, keyed by collection.
    pub async fn holdings(&self, wallet: &str) -> Option<BTreeMap<String, Vec<OwnedAsset>>> {
        self.entries.lock().await.get(&normalize(wallet)).cloned()
    }

    /// Records the assets `wallet` holds in `collection` and persists the cache.
    pub async fn record(&self, wallet: &str, collection: &str, assets: Vec<OwnedAsset>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(normalize(wallet))
            .or_default()
            .insert(collection.to_string(), assets);
        write_snapshot(&self.path, &*entries).await
    }

    /// Drops the cached holdings of every wallet in `wallets`.
    ///
    /// ### Returns
    /// - `Ok(usize)`: The number of entries removed. The document is only rewritten if this is
    ///    non-zero.
    pub async fn invalidate<'a>(&self, wallets: impl IntoIterator<Item = &'a str>) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let removed = wallets
            .into_iter()
            .filter(|wallet| entries.remove(&normalize(wallet)).is_some())
            .count();
        if removed > 0 {
            write_snapshot(&self.path, &*entries).await?;
        }
        Ok(removed)
    }
}
