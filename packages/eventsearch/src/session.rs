//! In-memory session store with streaming support and cancellation.
//!
//! Cancellation is a one-way atomic flag per session kept separate from
//! the status field, so long-running pipeline stages can poll it without
//! taking the session map lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{EventRecord, SearchQuery};

/// Lifecycle state of a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Error,
}

/// Progress of the pipeline run owning a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
    pub message: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current: 0,
            total: 0,
            percentage: 0.0,
            message: "Initializing...".to_string(),
        }
    }
}

/// One search run's results and progress, addressable by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub query: SearchQuery,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub progress: Progress,
    /// Ordered, append-only
    pub results: Vec<EventRecord>,
}

/// Thread-safe in-memory session store.
///
/// Eviction is lazy: callers invoke [`SessionStore::cleanup_older_than`]
/// on their own schedule.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    cancel_flags: RwLock<HashMap<String, Arc<AtomicBool>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            cancel_flags: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for a query and return its id.
    pub fn create(&self, query: SearchQuery) -> String {
        self.create_with_status(query, SessionStatus::Pending)
    }

    /// Create a session with an explicit initial status (batch runs
    /// store finished sessions directly).
    pub fn create_with_status(&self, query: SearchQuery, status: SessionStatus) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            query,
            status,
            created_at: Utc::now(),
            progress: Progress::default(),
            results: Vec::new(),
        };

        self.sessions.write().unwrap().insert(id.clone(), session);
        self.cancel_flags
            .write()
            .unwrap()
            .insert(id.clone(), Arc::new(AtomicBool::new(false)));

        info!(session_id = %id, "created session");
        id
    }

    /// Append one event to a session's results.
    ///
    /// Appending to a cancelled session is permitted: late arrivals from
    /// in-flight work are kept.
    pub fn add_result(&self, id: &str, event: EventRecord) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(id) {
            session.results.push(event);
            debug!(session_id = %id, total = session.results.len(), "appended result");
        }
    }

    /// Update a session's progress.
    pub fn update_progress(&self, id: &str, current: usize, total: usize, message: &str) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(id) {
            let percentage = if total > 0 {
                (current as f64 / total as f64 * 100.0 * 10.0).round() / 10.0
            } else {
                0.0
            };
            session.progress = Progress {
                current,
                total,
                percentage,
                message: message.to_string(),
            };
        }
    }

    /// Set a session's status.
    pub fn set_status(&self, id: &str, status: SessionStatus) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(id) {
            session.status = status;
            info!(session_id = %id, status = ?status, "session status");
        }
    }

    /// Cancel a session: atomically raise the cancellation flag and set
    /// the status. The flag never clears.
    pub fn cancel(&self, id: &str) {
        if let Some(flag) = self.cancel_flags.read().unwrap().get(id) {
            flag.store(true, Ordering::SeqCst);
        }
        self.set_status(id, SessionStatus::Cancelled);
        warn!(session_id = %id, "session cancelled");
    }

    /// Whether a session has been cancelled. Polled by the pipeline at
    /// its suspension points.
    pub fn is_cancelled(&self, id: &str) -> bool {
        self.cancel_flags
            .read()
            .unwrap()
            .get(id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Snapshot of a session.
    pub fn get_session(&self, id: &str) -> Option<Session> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// Just the results of a session.
    pub fn get_results(&self, id: &str) -> Option<Vec<EventRecord>> {
        self.sessions
            .read()
            .unwrap()
            .get(id)
            .map(|session| session.results.clone())
    }

    /// Just the progress of a session.
    pub fn get_progress(&self, id: &str) -> Option<Progress> {
        self.sessions
            .read()
            .unwrap()
            .get(id)
            .map(|session| session.progress.clone())
    }

    /// Delete a session. Returns false when it did not exist.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().unwrap().remove(id).is_some();
        if removed {
            self.cancel_flags.write().unwrap().remove(id);
            info!(session_id = %id, "deleted session");
        }
        removed
    }

    /// Evict sessions older than `max_age`. Returns how many were removed.
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let expired: Vec<String> = self
            .sessions
            .read()
            .unwrap()
            .values()
            .filter(|session| session.created_at < cutoff)
            .map(|session| session.id.clone())
            .collect();

        for id in &expired {
            self.delete(id);
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "cleaned up old sessions");
        }
        expired.len()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}
