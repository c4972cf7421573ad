use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Result, StoreError, UserStore};
use crate::user::User;

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<BTreeMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let map = users
            .into_iter()
            .map(|user| (user.profile_url.clone(), user))
            .collect();
        Self {
            users: Mutex::new(map),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, key: &str) -> Result<User> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.insert(user.profile_url.clone(), user.clone());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<User>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = MemoryUserStore::new();
        let user = User::new("https://a.example/");
        store.save(&user).await.expect("save");

        assert_eq!(store.get("https://a.example/").await.expect("get"), user);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = MemoryUserStore::new();
        let err = store.get("https://nobody.example/").await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(key) if key == "https://nobody.example/"));
    }

    #[tokio::test]
    async fn get_all_is_ordered_by_key() {
        let store = MemoryUserStore::with_users([
            User::new("https://b.example/"),
            User::new("https://a.example/"),
        ]);

        let keys: Vec<_> = store
            .get_all()
            .await
            .expect("all")
            .into_iter()
            .map(|u| u.profile_url)
            .collect();
        assert_eq!(keys, vec!["https://a.example/", "https://b.example/"]);
    }
}
