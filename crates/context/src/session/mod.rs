//! Conversation memory
//!
//! Sessions live in memory only. The map is guarded by an async `RwLock`
//! and every session has its own `Mutex`, so requests on different
//! sessions never contend while requests on the same session run one at
//! a time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use convorag_common::config::SessionConfig;
use convorag_common::metrics;
use convorag_common::models::{SessionInfo, Turn};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// JSON object attached to a session at creation
pub type SessionMetadata = serde_json::Map<String, serde_json::Value>;

/// One conversation
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: Option<String>,
    metadata: SessionMetadata,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    turns: VecDeque<Turn>,
}

impl Session {
    fn new(id: String, name: Option<String>, metadata: SessionMetadata) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            metadata,
            created_at: now,
            last_activity: now,
            turns: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Turns, oldest first
    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.turns.len()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            session_name: self.name.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.turns.len(),
            metadata: self.metadata.clone(),
        }
    }

    /// Append a user/assistant pair, dropping whole pairs from the front
    /// beyond `max_history_turns`
    fn push_exchange(&mut self, user: Turn, assistant: Turn, max_history_turns: usize) {
        self.turns.push_back(user);
        self.turns.push_back(assistant);
        while self.turns.len() > max_history_turns * 2 {
            self.turns.pop_front();
            self.turns.pop_front();
        }
        self.last_activity = Utc::now();
    }

    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let idle = (now - self.last_activity).to_std().unwrap_or_default();
        idle >= timeout
    }
}

/// Exclusive access to one session for the duration of a request
pub struct SessionGuard {
    guard: OwnedMutexGuard<Session>,
    max_history_turns: usize,
}

impl SessionGuard {
    /// Record one question and its answer
    pub fn append_exchange(
        &mut self,
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
    ) {
        self.guard.push_exchange(
            Turn::user(user_message),
            Turn::assistant(assistant_message),
            self.max_history_turns,
        );
    }
}

impl std::ops::Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.guard
    }
}

/// In-memory session store
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    max_history_turns: usize,
    timeout: Duration,
}

impl SessionStore {
    /// `max_history_turns` counts user/assistant pairs
    pub fn new(max_history_turns: usize, timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history_turns,
            timeout,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.max_history_turns,
            Duration::from_secs(config.timeout_minutes * 60),
        )
    }

    pub fn max_history_turns(&self) -> usize {
        self.max_history_turns
    }

    /// Create a session with a fresh id
    pub async fn create(&self, name: Option<String>, metadata: SessionMetadata) -> SessionInfo {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), name, metadata);
        let info = session.info();

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), Arc::new(Mutex::new(session)));
        metrics::record_sessions(sessions.len(), 0);

        info!(session_id = %id, "Session created");
        info
    }

    /// Append a user/assistant exchange under a single lock, creating the
    /// session if it does not exist yet
    pub async fn append_turn(
        &self,
        session_id: &str,
        user_message: impl Into<String>,
        assistant_message: impl Into<String>,
    ) {
        let handle = {
            let mut sessions = self.sessions.write().await;
            let created = !sessions.contains_key(session_id);
            let handle = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Session::new(
                        session_id.to_string(),
                        None,
                        SessionMetadata::new(),
                    )))
                })
                .clone();
            if created {
                debug!(session_id, "Session created on first turn");
                metrics::record_sessions(sessions.len(), 0);
            }
            handle
        };

        let mut guard = SessionGuard {
            guard: handle.lock_owned().await,
            max_history_turns: self.max_history_turns,
        };
        guard.append_exchange(user_message, assistant_message);
    }

    /// Turns of a session, oldest first. Unknown sessions have no history.
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        match self.handle(session_id).await {
            Some(handle) => handle.lock().await.history(),
            None => Vec::new(),
        }
    }

    /// Lock a live session for a read-answer-append cycle.
    ///
    /// Expired sessions are removed and reported missing.
    pub async fn lock(&self, session_id: &str) -> Option<SessionGuard> {
        let handle = self.handle(session_id).await?;
        let guard = handle.lock_owned().await;

        if guard.is_expired(Utc::now(), self.timeout) {
            drop(guard);
            self.remove_expired(session_id).await;
            return None;
        }

        Some(SessionGuard {
            guard,
            max_history_turns: self.max_history_turns,
        })
    }

    /// Summary of a live session
    pub async fn info(&self, session_id: &str) -> Option<SessionInfo> {
        self.lock(session_id).await.map(|guard| guard.info())
    }

    pub async fn exists(&self, session_id: &str) -> bool {
        self.info(session_id).await.is_some()
    }

    /// Remove sessions idle for at least `timeout`, skipping any in use.
    /// Returns how many were removed.
    pub async fn expire_sweep(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_expired(now, timeout),
            Err(_) => true,
        });

        let removed = before - sessions.len();
        metrics::record_sessions(sessions.len(), removed);
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Expired sessions removed");
        }
        removed
    }

    /// Sweep with the configured timeout
    pub async fn sweep(&self) -> usize {
        self.expire_sweep(self.timeout).await
    }

    pub async fn delete(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id).is_some();
        if removed {
            metrics::record_sessions(sessions.len(), 0);
            info!(session_id, "Session deleted");
        }
        removed
    }

    /// Live sessions, oldest first
    pub async fn list(&self) -> Vec<SessionInfo> {
        self.sweep().await;

        let handles: Vec<Arc<Mutex<Session>>> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            infos.push(handle.lock().await.info());
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// Number of live sessions
    pub async fn count(&self) -> usize {
        self.sweep().await;
        self.sessions.read().await.len()
    }

    /// Drop every session, returning how many there were
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        metrics::record_sessions(0, 0);
        count
    }

    async fn handle(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn remove_expired(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        let expired = sessions
            .get(session_id)
            .and_then(|handle| handle.try_lock().ok().map(|s| s.is_expired(Utc::now(), self.timeout)))
            .unwrap_or(false);
        if expired {
            sessions.remove(session_id);
            metrics::record_sessions(sessions.len(), 1);
            debug!(session_id, "Expired session removed on access");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convorag_common::models::Role;

    fn store(max_history_turns: usize) -> SessionStore {
        SessionStore::new(max_history_turns, Duration::from_secs(3600))
    }

    async fn backdate(store: &SessionStore, session_id: &str, by: chrono::Duration) {
        let handle = store.handle(session_id).await.unwrap();
        handle.lock().await.last_activity -= by;
    }

    #[tokio::test]
    async fn test_create_session() {
        let store = store(5);
        let info = store.create(Some("demo".to_string()), SessionMetadata::new()).await;

        assert!(Uuid::parse_str(&info.session_id).is_ok());
        assert_eq!(info.session_name.as_deref(), Some("demo"));
        assert_eq!(info.message_count, 0);
        assert!(store.exists(&info.session_id).await);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_append_creates_lazily() {
        let store = store(5);
        store.append_turn("client-id", "hello", "hi there").await;

        let history = store.history("client-id").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "hi there");
    }

    #[tokio::test]
    async fn test_unknown_session_has_empty_history() {
        let store = store(5);
        assert!(store.history("nope").await.is_empty());
        assert!(store.info("nope").await.is_none());
        assert!(store.lock("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_history_bounded_by_max_turns() {
        let max = 3;
        for m in [1usize, 2, 3, 4, 7] {
            let store = store(max);
            for i in 0..m {
                store.append_turn("s", format!("q{}", i), format!("a{}", i)).await;
            }
            let history = store.history("s").await;
            assert_eq!(history.len(), (2 * m).min(2 * max));
            assert_eq!(history[0].role, Role::User);
            assert_eq!(history[0].content, format!("q{}", m.saturating_sub(max)));
            assert_eq!(history.last().unwrap().content, format!("a{}", m - 1));
        }
    }

    #[tokio::test]
    async fn test_oldest_pairs_trimmed_first() {
        let store = store(1);
        store.append_turn("s", "first", "reply").await;
        store.append_turn("s", "second", "another reply").await;

        let contents: Vec<String> = store.history("s").await.into_iter().map(|t| t.content).collect();
        assert_eq!(contents, vec!["second", "another reply"]);
    }

    #[tokio::test]
    async fn test_zero_max_turns_keeps_no_history() {
        let store = store(0);
        store.append_turn("s", "question", "answer").await;

        assert!(store.history("s").await.is_empty());
        assert!(store.exists("s").await);
    }

    #[tokio::test]
    async fn test_zero_timeout_sweep_removes_new_session() {
        let store = store(5);
        let info = store.create(None, SessionMetadata::new()).await;
        assert_eq!(store.expire_sweep(Duration::ZERO).await, 1);
        assert!(store.history(&info.session_id).await.is_empty());
        assert!(!store.delete(&info.session_id).await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_sessions() {
        let store = store(5);
        let old = store.create(None, SessionMetadata::new()).await;
        let fresh = store.create(None, SessionMetadata::new()).await;
        backdate(&store, &old.session_id, chrono::Duration::hours(2)).await;

        assert_eq!(store.sweep().await, 1);
        assert!(!store.exists(&old.session_id).await);
        assert!(store.exists(&fresh.session_id).await);
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_sessions() {
        let store = store(5);
        let info = store.create(None, SessionMetadata::new()).await;
        let guard = store.lock(&info.session_id).await.unwrap();

        assert_eq!(store.expire_sweep(Duration::ZERO).await, 0);
        drop(guard);
        assert_eq!(store.expire_sweep(Duration::ZERO).await, 1);
    }

    #[tokio::test]
    async fn test_expired_session_reported_missing() {
        let store = store(5);
        let info = store.create(None, SessionMetadata::new()).await;
        backdate(&store, &info.session_id, chrono::Duration::hours(2)).await;

        assert!(store.info(&info.session_id).await.is_none());
        assert!(store.handle(&info.session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_guard_appends_and_touches() {
        let store = store(5);
        let info = store.create(None, SessionMetadata::new()).await;
        backdate(&store, &info.session_id, chrono::Duration::minutes(10)).await;

        {
            let mut guard = store.lock(&info.session_id).await.unwrap();
            guard.append_exchange("question", "answer");
            assert_eq!(guard.message_count(), 2);
        }

        let refreshed = store.info(&info.session_id).await.unwrap();
        assert_eq!(refreshed.message_count, 2);
        assert!(Utc::now() - refreshed.last_activity < chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_concurrent_requests_on_one_session_serialize() {
        let store = Arc::new(store(50));
        let info = store.create(None, SessionMetadata::new()).await;

        let mut tasks = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let id = info.session_id.clone();
            tasks.push(tokio::spawn(async move {
                let mut guard = store.lock(&id).await.unwrap();
                let history = guard.history();
                tokio::task::yield_now().await;
                guard.append_exchange(format!("q{}", i), format!("a{} after {}", i, history.len()));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let history = store.history(&info.session_id).await;
        assert_eq!(history.len(), 20);
        for (n, pair) in history.chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("a{} after {}", &pair[0].content[1..], 2 * n));
        }
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let store = store(5);
        let first = store.create(Some("a".to_string()), SessionMetadata::new()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.create(Some("b".to_string()), SessionMetadata::new()).await;

        let listed = store.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, first.session_id);

        assert_eq!(store.clear().await, 2);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store(5);
        let info = store.create(None, SessionMetadata::new()).await;
        assert!(store.delete(&info.session_id).await);
        assert!(!store.delete(&info.session_id).await);
    }
}
