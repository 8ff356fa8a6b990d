// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session store — explicit session objects keyed by ID, replacing ambient
// framework state. One workspace per session, never shared.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use blattwerk_core::SessionId;
use blattwerk_core::config::AppConfig;
use blattwerk_core::error::{BlattwerkError, Result};

use crate::workspace::Workspace;

/// One user session: an ID, its workspace, and when it was created.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub workspace: Workspace,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has outlived the configured maximum age.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        Utc::now() - self.created_at > max_age
    }
}

/// Store of live sessions, keyed by ID.
///
/// Handlers receive a `Session` from here instead of reaching into any
/// global state; expiry is an explicit sweep, not a framework hook.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    base_dir: PathBuf,
    max_age: Duration,
    max_upload_bytes: u64,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    /// Create a store rooted at the configured base temp directory.
    pub fn new(config: &AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;
        Ok(Self {
            inner: Arc::new(SessionStoreInner {
                base_dir: config.temp_dir.clone(),
                max_age: Duration::hours(config.max_file_age_hours as i64),
                max_upload_bytes: config.max_upload_bytes(),
                sessions: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// The base directory under which all session workspaces live.
    pub fn base_dir(&self) -> &std::path::Path {
        &self.inner.base_dir
    }

    /// Create a fresh session with its own workspace directory.
    #[instrument(skip(self))]
    pub fn create(&self) -> Result<Session> {
        let id = SessionId::new();
        let workspace = Workspace::create(
            self.inner.base_dir.join(id.to_string()),
            self.inner.max_upload_bytes,
        )?;
        let session = Session {
            id,
            workspace,
            created_at: Utc::now(),
        };

        self.inner.sessions.write().insert(id, session.clone());
        info!(session_id = %id, dir = %session.workspace.dir().display(), "session created");
        Ok(session)
    }

    /// Look up a live session.
    ///
    /// An expired session is removed (workspace included) and reported as
    /// unknown — the caller starts a new one.
    pub fn get(&self, id: &SessionId) -> Result<Session> {
        let session = self
            .inner
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BlattwerkError::Session(format!("unknown session {id}")))?;

        if session.is_expired(self.inner.max_age) {
            self.remove(id);
            return Err(BlattwerkError::Session(format!("session {id} expired")));
        }
        Ok(session)
    }

    /// Drop a session and delete its workspace directory.
    pub fn remove(&self, id: &SessionId) {
        if let Some(session) = self.inner.sessions.write().remove(id)
            && let Err(err) = std::fs::remove_dir_all(session.workspace.dir())
        {
            warn!(session_id = %id, %err, "could not remove session workspace");
        }
    }

    /// Remove every expired session. Returns how many were dropped.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self) -> usize {
        let expired: Vec<SessionId> = self
            .inner
            .sessions
            .read()
            .values()
            .filter(|s| s.is_expired(self.inner.max_age))
            .map(|s| s.id)
            .collect();

        for id in &expired {
            self.remove(id);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions removed");
        }
        expired.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &std::path::Path) -> SessionStore {
        let config = AppConfig {
            temp_dir: dir.to_path_buf(),
            ..AppConfig::default()
        };
        SessionStore::new(&config).expect("store")
    }

    #[test]
    fn create_makes_unique_workspaces() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path());

        let a = store.create().expect("a");
        let b = store.create().expect("b");
        assert_ne!(a.id, b.id);
        assert_ne!(a.workspace.dir(), b.workspace.dir());
        assert!(a.workspace.dir().is_dir());
        assert!(b.workspace.dir().is_dir());
    }

    #[test]
    fn get_returns_created_session() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path());

        let created = store.create().expect("create");
        let fetched = store.get(&created.id).expect("get");
        assert_eq!(fetched.id, created.id);
    }

    #[test]
    fn unknown_session_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path());
        assert!(store.get(&SessionId::new()).is_err());
    }

    #[test]
    fn remove_deletes_the_workspace() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path());

        let session = store.create().expect("create");
        let dir = session.workspace.dir().to_path_buf();
        store.remove(&session.id);
        assert!(!dir.exists());
        assert!(store.is_empty());
    }

    #[test]
    fn expired_sessions_are_swept() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            temp_dir: tmp.path().to_path_buf(),
            max_file_age_hours: 0,
            ..AppConfig::default()
        };
        let store = SessionStore::new(&config).expect("store");

        let session = store.create().expect("create");
        // max age zero: the session is already expired.
        assert!(store.get(&session.id).is_err());
        store.create().expect("another");
        assert_eq!(store.sweep_expired(), 1);
    }
}
