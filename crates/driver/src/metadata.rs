//! The metadata module derives battle traits from cached token metadata.

use crate::types::normalize;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use battle_mirror_solvers::battle::Traits;
use serde::Deserialize;
use std::path::PathBuf;

/// The largest trait value accepted from metadata.
pub const MAX_TRAIT: i64 = u32::MAX as i64;

/// The battle-relevant slice of a token's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProfile {
    pub traits: Traits,
    pub background: Option<String>,
}

/// The [TraitSource] trait looks up the [TokenProfile] of an NFT.
#[async_trait]
pub trait TraitSource: Send + Sync {
    /// Fetch the profile of `token_id` in `contract`. A missing file or trait is an error.
    async fn profile(&self, contract: &str, token_id: &str) -> Result<TokenProfile>;
}

#[derive(Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    attributes: Vec<Attribute>,
}

#[derive(Deserialize)]
struct Attribute {
    trait_type: String,
    value: serde_json::Value,
}

/// A [TraitSource] reading already-cached metadata documents laid out as
/// `<root>/<contract>/<tokenId>.json`.
#[derive(Debug, Clone)]
pub struct MetadataDir {
    root: PathBuf,
}

impl MetadataDir {
    /// Creates a new [MetadataDir] rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TraitSource for MetadataDir {
    async fn profile(&self, contract: &str, token_id: &str) -> Result<TokenProfile> {
        let path = self
            .root
            .join(normalize(contract))
            .join(format!("{}.json", token_id.trim()));
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Missing metadata file {}", path.display()))?;
        let document: MetadataDocument = serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed metadata file {}", path.display()))?;
        parse_profile(&document.attributes)
            .with_context(|| format!("Incomplete metadata in {}", path.display()))
    }
}

fn parse_profile(attributes: &[Attribute]) -> Result<TokenProfile> {
    let find = |name: &str| attributes.iter().find(|a| a.trait_type.eq_ignore_ascii_case(name));
    let stat = |name: &str| -> Result<i64> {
        let value = &find(name).ok_or(anyhow!("Trait `{}` not present", name))?.value;
        let stat = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or(anyhow!("Trait `{}` is not an integer: {}", name, value))?;
        if !(0..=MAX_TRAIT).contains(&stat) {
            return Err(anyhow!("Trait `{}` out of range: {}", name, stat));
        }
        Ok(stat)
    };

    Ok(TokenProfile {
        traits: Traits::new(
            stat("attack")?,
            stat("defense")?,
            stat("vitality")?,
            stat("agility")?,
            stat("core")?,
        ),
        background: find("background").map(|a| match &a.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::collections::HashMap;

    /// An in-memory [TraitSource] keyed by `(contract, token_id)`.
    #[derive(Default)]
    pub(crate) struct StaticTraits(pub HashMap<(String, String), Traits>);

    #[async_trait]
    impl TraitSource for StaticTraits {
        async fn profile(&self, contract: &str, token_id: &str) -> Result<TokenProfile> {
            self.0
                .get(&(contract.to_string(), token_id.to_string()))
                .map(|traits| TokenProfile {
                    traits: *traits,
                    background: None,
                })
                .ok_or(anyhow!("No metadata for {}/{}", contract, token_id))
        }
    }

    #[tokio::test]
    async fn reads_traits_from_metadata_dir() {
        let dir = tempfile::tempdir().unwrap();
        let collection = dir.path().join("0xc0ffee");
        tokio::fs::create_dir_all(&collection).await.unwrap();
        tokio::fs::write(
            collection.join("7.json"),
            r#"{
                "name": "Fighter #7",
                "attributes": [
                    { "trait_type": "Attack", "value": 5 },
                    { "trait_type": "Defense", "value": "3" },
                    { "trait_type": "Vitality", "value": 2 },
                    { "trait_type": "Agility", "value": 4 },
                    { "trait_type": "Core", "value": 1 },
                    { "trait_type": "Background", "value": "Ember" }
                ]
            }"#,
        )
        .await
        .unwrap();

        let source = MetadataDir::new(dir.path());
        let profile = source.profile("0xC0FFEE", "7").await.unwrap();
        assert_eq!(profile.traits, Traits::new(5, 3, 2, 4, 1));
        assert_eq!(profile.background.as_deref(), Some("Ember"));
    }

    #[tokio::test]
    async fn missing_file_or_trait_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = MetadataDir::new(dir.path());
        assert!(source.profile("0xc0ffee", "1").await.is_err());

        let collection = dir.path().join("0xc0ffee");
        tokio::fs::create_dir_all(&collection).await.unwrap();
        tokio::fs::write(
            collection.join("1.json"),
            r#"{ "attributes": [ { "trait_type": "Attack", "value": 5 } ] }"#,
        )
        .await
        .unwrap();
        assert!(source.profile("0xc0ffee", "1").await.is_err());
    }

    #[tokio::test]
    async fn out_of_range_traits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let collection = dir.path().join("0xc0ffee");
        tokio::fs::create_dir_all(&collection).await.unwrap();
        let source = MetadataDir::new(dir.path());

        for (token, attack) in [("1", "9223372036854775807"), ("2", "-1"), ("3", "4294967296")] {
            tokio::fs::write(
                collection.join(format!("{token}.json")),
                format!(
                    r#"{{ "attributes": [
                        {{ "trait_type": "Attack", "value": "{attack}" }},
                        {{ "trait_type": "Defense", "value": 1 }},
                        {{ "trait_type": "Vitality", "value": 1 }},
                        {{ "trait_type": "Agility", "value": 1 }},
                        {{ "trait_type": "Core", "value": 1 }}
                    ] }}"#
                ),
            )
            .await
            .unwrap();
            assert!(source.profile("0xc0ffee", token).await.is_err(), "attack {attack}");
        }
    }
}
