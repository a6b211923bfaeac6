//! JSON-file-backed persistence for user languages and usage counters.
//!
//! Both stores are tiny and written whole on every update. Each store guards
//! its read-modify-write cycle with its own mutex so concurrent sessions
//! cannot lose updates; the two stores are not transactional as a unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::error;

use crate::localization::DEFAULT_LANGUAGE;

/// Process-wide usage counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: u64,
    pub items: u64,
    pub documents: u64,
}

/// Counted actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatAction {
    /// A content item was accepted into a session.
    Item,
    /// A compiled document was delivered.
    Document,
    /// Any other counted interaction.
    Other,
}

/// Persistent user → language mapping.
#[derive(Clone)]
pub struct UserStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Language chosen by the user, falling back to the default language.
    pub async fn language_of(&self, user_id: u64) -> String {
        let _guard = self.lock.lock().await;
        read_users(&self.path)
            .get(&user_id.to_string())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    pub async fn set_language(&self, user_id: u64, language: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut users = read_users(&self.path);
        users.insert(user_id.to_string(), language.to_string());
        write_json(&self.path, &users)
    }

    /// Every user id ever seen, for broadcast and forward targets.
    pub async fn all_user_ids(&self) -> Vec<u64> {
        let _guard = self.lock.lock().await;
        let mut ids: Vec<u64> = read_users(&self.path)
            .keys()
            .filter_map(|key| key.parse().ok())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of users per language, for the admin statistics view.
    pub async fn language_counts(&self) -> HashMap<String, usize> {
        let _guard = self.lock.lock().await;
        let mut counts = HashMap::new();
        for language in read_users(&self.path).values() {
            *counts.entry(language.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Persistent usage counters.
#[derive(Clone)]
pub struct StatsStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Count one action. The read-increment-write cycle runs under the store
    /// mutex so concurrent sessions cannot drop increments.
    pub async fn record(&self, action: StatAction) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut stats = read_stats(&self.path);
        stats.total += 1;
        match action {
            StatAction::Item => stats.items += 1,
            StatAction::Document => stats.documents += 1,
            StatAction::Other => {}
        }
        write_json(&self.path, &stats)
    }

    pub async fn load(&self) -> UsageStats {
        let _guard = self.lock.lock().await;
        read_stats(&self.path)
    }
}

fn read_users(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "user store is corrupt, starting empty");
            HashMap::new()
        }),
        Err(_) => HashMap::new(),
    }
}

fn read_stats(path: &Path) -> UsageStats {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "stats store is corrupt, resetting");
            UsageStats::default()
        }),
        Err(_) => UsageStats::default(),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string(value)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        tempfile::tempdir().unwrap().keep().join(name)
    }

    #[tokio::test]
    async fn unknown_user_gets_default_language() {
        let store = UserStore::new(temp_path("users.json"));
        assert_eq!(store.language_of(42).await, DEFAULT_LANGUAGE);
    }

    #[tokio::test]
    async fn language_round_trips() {
        let store = UserStore::new(temp_path("users.json"));
        store.set_language(42, "kz").await.unwrap();
        store.set_language(7, "ru").await.unwrap();

        assert_eq!(store.language_of(42).await, "kz");
        assert_eq!(store.all_user_ids().await, vec![7, 42]);
        assert_eq!(store.language_counts().await.get("ru"), Some(&1));
    }

    #[tokio::test]
    async fn record_increments_matching_counter() {
        let store = StatsStore::new(temp_path("stats.json"));
        store.record(StatAction::Item).await.unwrap();
        store.record(StatAction::Item).await.unwrap();
        store.record(StatAction::Document).await.unwrap();
        store.record(StatAction::Other).await.unwrap();

        let stats = store.load().await;
        assert_eq!(stats.total, 4);
        assert_eq!(stats.items, 2);
        assert_eq!(stats.documents, 1);
    }

    #[tokio::test]
    async fn concurrent_records_do_not_lose_updates() {
        let store = StatsStore::new(temp_path("stats.json"));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record(StatAction::Item).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.load().await.total, 20);
    }
}
