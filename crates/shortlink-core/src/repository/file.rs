//! JSON file user repository
//!
//! Keeps the full user set in memory and rewrites the backing document
//! after every mutation. The document is replaced through a temporary
//! sibling file and a rename so a crash never leaves it half written.

use super::{MemoryUserRepository, RepositoryError, UserRepository};
use crate::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct FileUserRepository {
    path: PathBuf,
    users: MemoryUserRepository,
    /// Serializes mutate-then-persist sequences
    write_lock: Mutex<()>,
}

impl FileUserRepository {
    /// Open the document at `path`, starting empty if it does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let users: Vec<User> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), users = users.len(), "Loaded user file");

        Ok(Self {
            path,
            users: MemoryUserRepository::from_users(users),
            write_lock: Mutex::new(()),
        })
    }

    async fn persist(&self) -> Result<(), RepositoryError> {
        let users = self.users.snapshot().await;
        let bytes = serde_json::to_vec_pretty(&users)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Persist the working set, or put it back to `before` if the write fails
    ///
    /// Callers hold `write_lock` from taking `before` until this returns.
    async fn persist_or_rollback(&self, before: Vec<User>) -> Result<(), RepositoryError> {
        if let Err(e) = self.persist().await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist users");
            self.users.restore(before).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for FileUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let before = self.users.snapshot().await;
        self.users.create(user).await?;
        self.persist_or_rollback(before).await
    }

    async fn find_by_id(&self, id: &str) -> Result<User, RepositoryError> {
        self.users.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        self.users.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        self.users.find_by_email(email).await
    }

    async fn find_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        self.users.find_by_login(login).await
    }

    async fn change_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let before = self.users.snapshot().await;
        self.users.change_password(id, password_hash).await?;
        self.persist_or_rollback(before).await
    }

    async fn set_suspended(
        &self,
        id: &str,
        suspended_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let before = self.users.snapshot().await;
        self.users.set_suspended(id, suspended_at).await?;
        self.persist_or_rollback(before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileUserRepository::open(dir.path().join("users.json"))
            .await
            .unwrap();

        assert!(matches!(
            repo.find_by_login("kenplix").await,
            Err(RepositoryError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");

        let user = User::new("kenplix", "a@b.com", "old");
        {
            let repo = FileUserRepository::open(&path).await.unwrap();
            repo.create(&user).await.unwrap();
            repo.change_password(&user.id, "new").await.unwrap();
            repo.set_suspended(&user.id, Some(Utc::now())).await.unwrap();
        }

        let reopened = FileUserRepository::open(&path).await.unwrap();
        let stored = reopened.find_by_email("a@b.com").await.unwrap();
        assert_eq!(stored.id, user.id);
        assert_eq!(stored.password_hash, "new");
        assert!(stored.is_suspended());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejected_create_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let repo = FileUserRepository::open(&path).await.unwrap();
        repo.create(&User::new("kenplix", "a@b.com", "hash"))
            .await
            .unwrap();
        let duplicate = User::new("other", "a@b.com", "hash");
        assert!(matches!(
            repo.create(&duplicate).await,
            Err(RepositoryError::EmailTaken)
        ));

        let reopened = FileUserRepository::open(&path).await.unwrap();
        assert!(matches!(
            reopened.find_by_username("other").await,
            Err(RepositoryError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let repo = FileUserRepository::open(&path).await.unwrap();
        let user = User::new("kenplix", "a@b.com", "old");
        repo.create(&user).await.unwrap();

        // A directory where the temp file goes makes every write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        let other = User::new("other", "c@d.com", "hash");
        assert!(matches!(repo.create(&other).await, Err(RepositoryError::Io(_))));
        assert!(matches!(
            repo.find_by_email("c@d.com").await,
            Err(RepositoryError::UserNotFound)
        ));

        assert!(repo.change_password(&user.id, "new").await.is_err());
        assert!(repo.set_suspended(&user.id, Some(Utc::now())).await.is_err());
        let stored = repo.find_by_id(&user.id).await.unwrap();
        assert_eq!(stored.password_hash, "old");
        assert!(!stored.is_suspended());

        // Once writes work again the rejected email is free
        std::fs::remove_dir(path.with_extension("json.tmp")).unwrap();
        repo.create(&other).await.unwrap();

        let reopened = FileUserRepository::open(&path).await.unwrap();
        assert_eq!(reopened.find_by_email("c@d.com").await.unwrap().id, other.id);
        assert_eq!(reopened.find_by_id(&user.id).await.unwrap().password_hash, "old");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = FileUserRepository::open(&path).await;
        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
    }
}
