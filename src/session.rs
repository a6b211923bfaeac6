//! Per-user accumulation sessions.
//!
//! A session is created by `/start`, holds the ordered queue of content items
//! the user has sent so far, and is discarded by `/cancel`. Sessions live in
//! memory only; a process restart drops them.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One unit of user-submitted content, destined for one or more output pages.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text { content: String },
    Image { content: Vec<u8> },
}

impl ContentItem {
    /// Raw size of the item payload in bytes.
    pub fn raw_size(&self) -> usize {
        match self {
            ContentItem::Text { content } => content.len(),
            ContentItem::Image { content } => content.len(),
        }
    }
}

#[derive(Debug, Default)]
struct UserSession {
    items: Vec<ContentItem>,
    hint_shown: bool,
}

/// Error returned when an operation targets a user without an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotStarted,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotStarted => write!(f, "no active session for this user"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Owner of all accumulation sessions, keyed by Telegram user id.
///
/// All access goes through the shared mutex, so per-session read-modify-write
/// cycles (append, drain) are serialized with respect to each other.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<Mutex<HashMap<u64, UserSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session for the user, resetting any existing one.
    pub async fn start(&self, user_id: u64) {
        let mut sessions = self.inner.lock().await;
        sessions.insert(user_id, UserSession::default());
    }

    /// Discard the user's session entirely.
    pub async fn end(&self, user_id: u64) {
        let mut sessions = self.inner.lock().await;
        sessions.remove(&user_id);
    }

    pub async fn is_active(&self, user_id: u64) -> bool {
        let sessions = self.inner.lock().await;
        sessions.contains_key(&user_id)
    }

    /// Append an item to the user's queue. Items keep strict arrival order.
    pub async fn append(&self, user_id: u64, item: ContentItem) -> Result<usize, SessionError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.get_mut(&user_id).ok_or(SessionError::NotStarted)?;
        session.items.push(item);
        Ok(session.items.len())
    }

    /// Take all accumulated items, leaving the queue empty.
    pub async fn drain(&self, user_id: u64) -> Result<Vec<ContentItem>, SessionError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.get_mut(&user_id).ok_or(SessionError::NotStarted)?;
        Ok(std::mem::take(&mut session.items))
    }

    /// Empty the queue without returning the items.
    pub async fn clear(&self, user_id: u64) -> Result<(), SessionError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.get_mut(&user_id).ok_or(SessionError::NotStarted)?;
        session.items.clear();
        Ok(())
    }

    /// Clone the current queue without consuming it. Compilation works from a
    /// snapshot so a failed run leaves the store untouched.
    pub async fn snapshot(&self, user_id: u64) -> Result<Vec<ContentItem>, SessionError> {
        let sessions = self.inner.lock().await;
        let session = sessions.get(&user_id).ok_or(SessionError::NotStarted)?;
        Ok(session.items.clone())
    }

    pub async fn hint_shown(&self, user_id: u64) -> Result<bool, SessionError> {
        let sessions = self.inner.lock().await;
        let session = sessions.get(&user_id).ok_or(SessionError::NotStarted)?;
        Ok(session.hint_shown)
    }

    pub async fn set_hint_shown(&self, user_id: u64, shown: bool) -> Result<(), SessionError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.get_mut(&user_id).ok_or(SessionError::NotStarted)?;
        session.hint_shown = shown;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ContentItem {
        ContentItem::Text {
            content: s.to_string(),
        }
    }

    #[tokio::test]
    async fn append_requires_session() {
        let manager = SessionManager::new();
        assert_eq!(
            manager.append(1, text("hello")).await,
            Err(SessionError::NotStarted)
        );
    }

    #[tokio::test]
    async fn drain_returns_items_in_arrival_order() {
        let manager = SessionManager::new();
        manager.start(1).await;
        manager.append(1, text("first")).await.unwrap();
        manager
            .append(
                1,
                ContentItem::Image {
                    content: vec![1, 2, 3],
                },
            )
            .await
            .unwrap();
        manager.append(1, text("third")).await.unwrap();

        let drained = manager.drain(1).await.unwrap();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], text("first"));
        assert_eq!(
            drained[1],
            ContentItem::Image {
                content: vec![1, 2, 3]
            }
        );
        assert_eq!(drained[2], text("third"));

        // Store must be empty afterwards.
        assert!(manager.drain(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let manager = SessionManager::new();
        manager.start(1).await;
        manager.start(2).await;
        manager.append(1, text("a")).await.unwrap();
        manager.append(2, text("b")).await.unwrap();
        manager.append(1, text("c")).await.unwrap();

        assert_eq!(manager.drain(1).await.unwrap(), vec![text("a"), text("c")]);
        assert_eq!(manager.drain(2).await.unwrap(), vec![text("b")]);
    }

    #[tokio::test]
    async fn snapshot_does_not_consume() {
        let manager = SessionManager::new();
        manager.start(7).await;
        manager.append(7, text("keep me")).await.unwrap();

        let snap = manager.snapshot(7).await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(manager.snapshot(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restart_resets_items_and_hint() {
        let manager = SessionManager::new();
        manager.start(5).await;
        manager.append(5, text("old")).await.unwrap();
        manager.set_hint_shown(5, true).await.unwrap();

        manager.start(5).await;
        assert!(manager.snapshot(5).await.unwrap().is_empty());
        assert!(!manager.hint_shown(5).await.unwrap());
    }

    #[tokio::test]
    async fn end_discards_session() {
        let manager = SessionManager::new();
        manager.start(9).await;
        manager.end(9).await;
        assert!(!manager.is_active(9).await);
        assert_eq!(manager.clear(9).await, Err(SessionError::NotStarted));
    }
}
