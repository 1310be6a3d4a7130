//! Terminal login sessions.
//!
//! A session binds an opaque token to a worker's login context at one
//! station. Tokens are the only handle terminals hold; everything else is
//! looked up here. The store is deliberately simple: a coarse lock over a
//! token map, no TTL, destruction only by explicit logout or bulk
//! invalidation.
//!
//! A worker may hold several live sessions at once (one per station or
//! device), so lookups by worker return a list.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::token::{TokenSource, UuidTokens};

/// One live login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token identifying this session.
    pub token: String,
    /// Badge number of the logged-in worker.
    pub worker_id: u32,
    /// Code of the station the login happened at.
    pub station_code: String,
    /// Operator-facing station name.
    pub station_name: String,
    /// Whether this worker is the station's default worker.
    pub default_worker: bool,
    /// When the login was accepted.
    pub login_time: DateTime<Utc>,
}

/// Login context for a session about to be created.
///
/// The store supplies the token and login time itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    /// Badge number of the worker logging in.
    pub worker_id: u32,
    /// Code of the station being logged into.
    pub station_code: String,
    /// Operator-facing station name.
    pub station_name: String,
    /// Whether this worker is the station's default worker.
    pub default_worker: bool,
}

/// Concurrent session store.
///
/// All operations take `&self` and are safe to call from any thread. The
/// single lock is coarse on purpose: session churn is light, and readers
/// must never observe a half-written entry.
pub struct SessionStore<T: TokenSource = UuidTokens> {
    sessions: RwLock<HashMap<String, Session>>,
    tokens: T,
    clock: Arc<dyn Clock>,
}

impl<T: TokenSource> std::fmt::Debug for SessionStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore<UuidTokens> {
    /// Store minting UUID tokens and stamping with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with(UuidTokens, Arc::new(SystemClock))
    }
}

impl Default for SessionStore<UuidTokens> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TokenSource> SessionStore<T> {
    /// Store with an explicit token source and clock.
    pub fn with(tokens: T, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            tokens,
            clock,
        }
    }

    /// Create a session for the given login context and return it, token
    /// included.
    ///
    /// The minted token is guaranteed unique among live sessions: on the
    /// unlikely collision the store simply mints again.
    pub fn create(&self, new: NewSession) -> Session {
        let mut sessions = self.exclusive();
        let token = loop {
            let candidate = self.tokens.mint();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Session {
            token: token.clone(),
            worker_id: new.worker_id,
            station_code: new.station_code,
            station_name: new.station_name,
            default_worker: new.default_worker,
            login_time: self.clock.now(),
        };
        let _ = sessions.insert(token, session.clone());
        debug!(
            worker_id = session.worker_id,
            station = %session.station_code,
            "session created"
        );
        session
    }

    /// Look up a session by token. Absent or expired tokens are `None`,
    /// not an error; the caller decides whether that is worth reporting.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<Session> {
        self.shared().get(token).cloned()
    }

    /// Atomically swap the login context under a live token.
    ///
    /// Returns true and stamps a fresh login time if the token was live;
    /// returns false without creating anything otherwise.
    pub fn replace(&self, token: &str, new: NewSession) -> bool {
        let mut sessions = self.exclusive();
        let replaced = sessions.get_mut(token).is_some_and(|session| {
            *session = Session {
                token: token.to_string(),
                worker_id: new.worker_id,
                station_code: new.station_code,
                station_name: new.station_name,
                default_worker: new.default_worker,
                login_time: self.clock.now(),
            };
            true
        });
        drop(sessions);
        if replaced {
            debug!(token_live = true, "session context replaced");
        }
        replaced
    }

    /// Remove a session. True iff the token was live.
    pub fn remove(&self, token: &str) -> bool {
        let removed = self.exclusive().remove(token).is_some();
        if removed {
            debug!("session removed");
        }
        removed
    }

    /// Whether the token refers to a live session.
    #[must_use]
    pub fn is_valid(&self, token: &str) -> bool {
        self.shared().contains_key(token)
    }

    /// All live sessions for one worker, ordered by login time.
    #[must_use]
    pub fn sessions_for_worker(&self, worker_id: u32) -> Vec<Session> {
        let mut list: Vec<Session> = self
            .shared()
            .values()
            .filter(|session| session.worker_id == worker_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            a.login_time
                .cmp(&b.login_time)
                .then_with(|| a.token.cmp(&b.token))
        });
        list
    }

    /// Remove every session held by one worker. Returns the count removed.
    pub fn clear_worker(&self, worker_id: u32) -> usize {
        let mut sessions = self.exclusive();
        let before = sessions.len();
        sessions.retain(|_, session| session.worker_id != worker_id);
        let removed = before - sessions.len();
        drop(sessions);
        if removed > 0 {
            debug!(worker_id, removed, "worker sessions cleared");
        }
        removed
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared().len()
    }

    /// True if no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared().is_empty()
    }

    fn shared(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().expect("session map lock poisoned")
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().expect("session map lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
