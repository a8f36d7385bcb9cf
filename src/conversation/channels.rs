//! Active channel set, persisted as one channel id per line.

use crate::error::Result;
use anyhow::Context as _;
use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _, AsyncWriteExt as _};
use tokio::sync::RwLock;

/// Channels where every message is treated as addressed to the bot.
///
/// Activation appends the id to the file; deactivation rewrites the file
/// without it. File writes happen under the write lock so the file always
/// matches the in-memory set.
#[derive(Debug)]
pub struct ChannelStore {
    path: PathBuf,
    active: RwLock<HashSet<u64>>,
}

/// Outcome of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Activated,
    Deactivated,
}

impl ChannelStore {
    /// Load the set from `path`. A missing file is an empty set.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut active = HashSet::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
                    match line.parse::<u64>() {
                        Ok(id) => {
                            active.insert(id);
                        }
                        Err(error) => {
                            tracing::warn!(path = %path.display(), line, %error, "skipping malformed channel id");
                        }
                    }
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(anyhow::Error::new(error)
                    .context(format!("failed to read channel list: {}", path.display()))
                    .into());
            }
        }

        tracing::debug!(count = active.len(), "active channels loaded");

        Ok(Self {
            path,
            active: RwLock::new(active),
        })
    }

    pub async fn contains(&self, channel_id: u64) -> bool {
        self.active.read().await.contains(&channel_id)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.active.read().await.len()
    }

    /// Flip membership of `channel_id` and persist the change.
    pub async fn toggle(&self, channel_id: u64) -> Result<Toggle> {
        let mut active = self.active.write().await;

        if active.remove(&channel_id) {
            let mut contents = String::new();
            for id in active.iter() {
                contents.push_str(&id.to_string());
                contents.push('\n');
            }
            if let Err(error) = tokio::fs::write(&self.path, contents).await {
                active.insert(channel_id);
                return Err(anyhow::Error::new(error)
                    .context(format!("failed to rewrite channel list: {}", self.path.display()))
                    .into());
            }
            tracing::info!(channel_id, "channel deactivated");
            Ok(Toggle::Deactivated)
        } else {
            self.append(channel_id)
                .await
                .with_context(|| format!("failed to append to channel list: {}", self.path.display()))?;
            active.insert(channel_id);
            tracing::info!(channel_id, "channel activated");
            Ok(Toggle::Activated)
        }
    }

    async fn append(&self, channel_id: u64) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        // A hand-edited file may lack the trailing newline.
        let mut line = String::new();
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.push('\n');
            }
        }
        line.push_str(&format!("{channel_id}\n"));

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activation_appends_and_deactivation_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        let store = ChannelStore::load(&path).await.unwrap();

        assert_eq!(store.toggle(111).await.unwrap(), Toggle::Activated);
        assert_eq!(store.toggle(222).await.unwrap(), Toggle::Activated);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "111\n222\n");

        assert_eq!(store.toggle(111).await.unwrap(), Toggle::Deactivated);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "222\n");
        assert!(!store.contains(111).await);
        assert!(store.contains(222).await);
    }

    #[tokio::test]
    async fn double_toggle_restores_membership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        let store = ChannelStore::load(&path).await.unwrap();

        store.toggle(42).await.unwrap();
        store.toggle(42).await.unwrap();

        assert!(!store.contains(42).await);
        assert_eq!(store.len().await, 0);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "");
    }

    #[tokio::test]
    async fn load_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        tokio::fs::write(&path, "10\n\nnot-a-number\n 20 \n").await.unwrap();

        let store = ChannelStore::load(&path).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.contains(10).await);
        assert!(store.contains(20).await);
    }

    #[tokio::test]
    async fn activation_after_unterminated_line_keeps_both_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.txt");
        tokio::fs::write(&path, "10").await.unwrap();

        let store = ChannelStore::load(&path).await.unwrap();
        assert_eq!(store.toggle(20).await.unwrap(), Toggle::Activated);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "10\n20\n");

        let reloaded = ChannelStore::load(&path).await.unwrap();
        assert!(reloaded.contains(10).await);
        assert!(reloaded.contains(20).await);
        assert!(!reloaded.contains(1020).await);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChannelStore::load(dir.path().join("absent.txt")).await.unwrap();
        assert_eq!(store.len().await, 0);
    }
}
