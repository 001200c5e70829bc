//! In-memory login sessions with sliding idle expiry.
//!
//! A session is valid while `now - last_access <= idle_timeout`. Every
//! successful validity check refreshes `last_access`. Expired sessions are
//! evicted lazily on their next check; [`SessionStore::sweep_expired`] bounds
//! memory for sessions that are never presented again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use minerd_telemetry::Metrics;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Time source for session bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Opaque session identifier carried in the session cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

/// A login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub created_at: Instant,
    pub last_access: Instant,
}

/// Session table guarded by a mutex that is never held across I/O.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionToken, Session>>,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self::with_clock(idle_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
            clock,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Create a session, dropping `previous` if the requester already had one.
    pub fn create(&self, previous: Option<&SessionToken>) -> Session {
        let now = self.clock.now();
        let session = Session {
            token: SessionToken::generate(),
            created_at: now,
            last_access: now,
        };

        let count = {
            let mut sessions = self.sessions.lock();
            if let Some(previous) = previous {
                sessions.remove(previous);
            }
            sessions.insert(session.token.clone(), session.clone());
            sessions.len()
        };
        Metrics::sessions_active(count);
        debug!(token = ?session.token, sessions = count, "Session created");
        session
    }

    /// Check a token, refreshing it when valid and evicting it when expired.
    pub fn touch(&self, token: &SessionToken) -> bool {
        let now = self.clock.now();
        let (valid, count) = {
            let mut sessions = self.sessions.lock();
            let valid = match sessions.get_mut(token) {
                None => return false,
                Some(session) => {
                    let fresh = self.is_fresh(session, now);
                    if fresh {
                        session.last_access = now;
                    }
                    fresh
                }
            };
            if !valid {
                sessions.remove(token);
            }
            (valid, sessions.len())
        };

        if !valid {
            Metrics::sessions_active(count);
            debug!(token = ?token, "Session expired");
        }
        valid
    }

    /// Remove a session. Returns whether it existed.
    pub fn remove(&self, token: &SessionToken) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.lock();
            let removed = sessions.remove(token).is_some();
            (removed, sessions.len())
        };
        if removed {
            Metrics::sessions_active(count);
        }
        removed
    }

    /// Evict every expired session. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let (removed, count) = {
            let mut sessions = self.sessions.lock();
            let before = sessions.len();
            sessions.retain(|_, session| self.is_fresh(session, now));
            (before - sessions.len(), sessions.len())
        };
        if removed > 0 {
            Metrics::sessions_active(count);
            debug!(removed, remaining = count, "Swept expired sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_access) <= self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(60);

    fn store() -> (SessionStore, ManualClock) {
        let clock = ManualClock::new();
        let store = SessionStore::with_clock(IDLE, Arc::new(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_valid_until_idle_timeout() {
        let (store, clock) = store();
        let session = store.create(None);

        clock.advance(IDLE);
        assert!(store.touch(&session.token));
    }

    #[test]
    fn test_sliding_expiration() {
        let (store, clock) = store();
        let session = store.create(None);

        for _ in 0..5 {
            clock.advance(Duration::from_secs(50));
            assert!(store.touch(&session.token));
        }
        // 250s after creation, still alive thanks to refreshes
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_gap_longer_than_timeout_evicts() {
        let (store, clock) = store();
        let session = store.create(None);

        clock.advance(IDLE + Duration::from_secs(1));
        assert!(!store.touch(&session.token));
        assert!(store.is_empty());

        // Stays invalid afterwards
        assert!(!store.touch(&session.token));
    }

    #[test]
    fn test_repeated_checks_agree() {
        let (store, _clock) = store();
        let session = store.create(None);
        assert_eq!(store.touch(&session.token), store.touch(&session.token));

        let unknown = SessionToken::from("nope");
        assert_eq!(store.touch(&unknown), store.touch(&unknown));
    }

    #[test]
    fn test_create_replaces_previous() {
        let (store, _clock) = store();
        let first = store.create(None);
        let second = store.create(Some(&first.token));

        assert_ne!(first.token, second.token);
        assert!(!store.touch(&first.token));
        assert!(store.touch(&second.token));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (store, _clock) = store();
        let session = store.create(None);

        assert!(store.remove(&session.token));
        assert!(!store.remove(&session.token));
        assert!(!store.touch(&session.token));
    }

    #[test]
    fn test_sweep_expired() {
        let (store, clock) = store();
        let stale = store.create(None);
        clock.advance(Duration::from_secs(45));
        let fresh = store.create(None);
        clock.advance(Duration::from_secs(30));

        assert_eq!(store.sweep_expired(), 1);
        assert!(!store.touch(&stale.token));
        assert!(store.touch(&fresh.token));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::from("abcdef0123456789");
        let debug = format!("{token:?}");
        assert!(!debug.contains("0123456789"));
    }
}
