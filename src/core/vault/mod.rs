use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Access/refresh pair for the platform channel. Short-lived access
/// token, long-lived refresh token; both rotate on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Durable key-value store for the platform token pair. Persisted as a
/// small TOML file; writes go through a temp file and rename so a crash
/// mid-write never leaves a torn credential.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<TokenPair> {
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        let pair: TokenPair = toml::from_str(&raw)
            .with_context(|| format!("Invalid token file {}", self.path.display()))?;
        Ok(pair)
    }

    pub async fn persist(&self, pair: &TokenPair) -> Result<()> {
        let raw = toml::to_string(pair).context("Failed to serialize token pair")?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, raw)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.toml"));
        let pair = TokenPair {
            access_token: "act.abc".to_string(),
            refresh_token: "rft.def".to_string(),
        };

        store.persist(&pair).await.unwrap();
        assert_eq!(store.load().await.unwrap(), pair);
    }

    #[tokio::test]
    async fn persist_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.toml"));
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        store.persist(&pair).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["tokens.toml".to_string()]);
    }

    #[tokio::test]
    async fn persist_overwrites_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.toml"));
        for suffix in ["one", "two"] {
            store
                .persist(&TokenPair {
                    access_token: format!("act.{suffix}"),
                    refresh_token: format!("rft.{suffix}"),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.load().await.unwrap().access_token, "act.two");
    }

    #[tokio::test]
    async fn load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.toml"));
        assert!(store.load().await.is_err());
    }
}
