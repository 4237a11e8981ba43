//! In-memory user repository
//!
//! Backs tests and single-process development setups. Also serves as the
//! working set of `FileUserRepository`.

use super::{RepositoryError, UserRepository};
use crate::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Users keyed by id behind a reader/writer lock
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with existing records
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Copy of every stored record, oldest first
    pub async fn snapshot(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        users
    }

    /// Replace every stored record with `users`
    pub async fn restore(&self, users: Vec<User>) {
        *self.users.write().await = users.into_iter().map(|u| (u.id.clone(), u)).collect();
    }

    async fn find_by<F>(&self, predicate: F) -> Result<User, RepositoryError>
    where
        F: Fn(&User) -> bool,
    {
        self.users
            .read()
            .await
            .values()
            .find(|u| predicate(u))
            .cloned()
            .ok_or(RepositoryError::UserNotFound)
    }

    async fn update<F>(&self, id: &str, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or(RepositoryError::UserNotFound)?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::UsernameTaken);
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::EmailTaken);
        }
        if users.contains_key(&user.id) {
            return Err(RepositoryError::Database(format!(
                "duplicate user id {}",
                user.id
            )));
        }

        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<User, RepositoryError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(RepositoryError::UserNotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        self.find_by(|u| u.username == username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        self.find_by(|u| u.email == email).await
    }

    async fn find_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        self.find_by(|u| u.username == login || u.email == login).await
    }

    async fn change_password(&self, id: &str, password_hash: &str) -> Result<(), RepositoryError> {
        self.update(id, |u| u.password_hash = password_hash.to_string())
            .await
    }

    async fn set_suspended(
        &self,
        id: &str,
        suspended_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        self.update(id, |u| u.suspended_at = suspended_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = MemoryUserRepository::new();
        let user = User::new("kenplix", "a@b.com", "hash");
        repo.create(&user).await.unwrap();

        assert_eq!(repo.find_by_id(&user.id).await.unwrap(), user);
        assert_eq!(repo.find_by_username("kenplix").await.unwrap(), user);
        assert_eq!(repo.find_by_email("a@b.com").await.unwrap(), user);
        assert_eq!(repo.find_by_login("kenplix").await.unwrap(), user);
        assert_eq!(repo.find_by_login("a@b.com").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_misses_are_user_not_found() {
        let repo = MemoryUserRepository::new();

        assert!(matches!(repo.find_by_id("nope").await, Err(RepositoryError::UserNotFound)));
        assert!(matches!(
            repo.find_by_login("nope").await,
            Err(RepositoryError::UserNotFound)
        ));
        assert!(matches!(
            repo.change_password("nope", "hash").await,
            Err(RepositoryError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let repo = MemoryUserRepository::new();
        repo.create(&User::new("kenplix", "a@b.com", "hash"))
            .await
            .unwrap();

        let same_name = User::new("kenplix", "other@b.com", "hash");
        assert!(matches!(
            repo.create(&same_name).await,
            Err(RepositoryError::UsernameTaken)
        ));

        let same_email = User::new("other", "a@b.com", "hash");
        assert!(matches!(
            repo.create(&same_email).await,
            Err(RepositoryError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_change_password_and_suspend() {
        let repo = MemoryUserRepository::new();
        let user = User::new("kenplix", "a@b.com", "old");
        repo.create(&user).await.unwrap();

        repo.change_password(&user.id, "new").await.unwrap();
        let stored = repo.find_by_id(&user.id).await.unwrap();
        assert_eq!(stored.password_hash, "new");
        assert!(stored.updated_at >= user.updated_at);

        repo.set_suspended(&user.id, Some(Utc::now())).await.unwrap();
        assert!(repo.find_by_id(&user.id).await.unwrap().is_suspended());

        repo.set_suspended(&user.id, None).await.unwrap();
        assert!(!repo.find_by_id(&user.id).await.unwrap().is_suspended());
    }
}
