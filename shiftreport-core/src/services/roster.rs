//! Known-user roster: chats that verified at least once, used for restart notices

use crate::models::ChatId;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Roster IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Roster file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent set of known users
#[async_trait]
pub trait Roster: Send + Sync {
    async fn remember(&self, chat: ChatId) -> Result<(), RosterError>;

    /// Remove a user (no-op when unknown)
    async fn forget(&self, chat: ChatId) -> Result<(), RosterError>;

    async fn known_users(&self) -> Result<Vec<ChatId>, RosterError>;
}

/// Roster stored as a JSON array of chat ids
pub struct FileRoster {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeSet<ChatId>, RosterError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeSet::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, users: &BTreeSet<ChatId>) -> Result<(), RosterError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(users)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl Roster for FileRoster {
    async fn remember(&self, chat: ChatId) -> Result<(), RosterError> {
        let _guard = self.lock.lock().await;
        let mut users = self.load().await?;
        if users.insert(chat) {
            self.store(&users).await?;
        }
        Ok(())
    }

    async fn forget(&self, chat: ChatId) -> Result<(), RosterError> {
        let _guard = self.lock.lock().await;
        let mut users = self.load().await?;
        if users.remove(&chat) {
            self.store(&users).await?;
        }
        Ok(())
    }

    async fn known_users(&self) -> Result<Vec<ChatId>, RosterError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().collect())
    }
}

/// Volatile roster for tests and dry runs
#[derive(Default)]
pub struct MemoryRoster {
    users: RwLock<BTreeSet<ChatId>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Roster for MemoryRoster {
    async fn remember(&self, chat: ChatId) -> Result<(), RosterError> {
        self.users.write().await.insert(chat);
        Ok(())
    }

    async fn forget(&self, chat: ChatId) -> Result<(), RosterError> {
        self.users.write().await.remove(&chat);
        Ok(())
    }

    async fn known_users(&self) -> Result<Vec<ChatId>, RosterError> {
        Ok(self.users.read().await.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_roster_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");

        let roster = FileRoster::new(&path);
        assert!(roster.known_users().await.unwrap().is_empty());
        roster.remember(ChatId(42)).await.unwrap();
        roster.remember(ChatId(7)).await.unwrap();
        roster.remember(ChatId(42)).await.unwrap();

        let reopened = FileRoster::new(&path);
        assert_eq!(
            reopened.known_users().await.unwrap(),
            vec![ChatId(7), ChatId(42)]
        );

        reopened.forget(ChatId(42)).await.unwrap();
        reopened.forget(ChatId(1000)).await.unwrap();
        assert_eq!(reopened.known_users().await.unwrap(), vec![ChatId(7)]);
    }

    #[tokio::test]
    async fn test_file_roster_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "not json").unwrap();

        let roster = FileRoster::new(&path);
        assert!(matches!(
            roster.known_users().await,
            Err(RosterError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_roster() {
        let roster = MemoryRoster::with_users([ChatId(3)]);
        roster.remember(ChatId(1)).await.unwrap();
        roster.forget(ChatId(3)).await.unwrap();
        assert_eq!(roster.known_users().await.unwrap(), vec![ChatId(1)]);
    }
}
