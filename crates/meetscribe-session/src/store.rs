//! Session Store
//!
//! Single source of truth for the captured credentials. Every mutation goes
//! through `update`, `replace_token`, `commit` or `clear`, each under one
//! write lock, so readers only ever see whole states.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::SessionError;
use crate::state::{Secret, SessionState, SessionStatus, SessionUpdate};
use crate::Result;

/// Outcome of offering a freshly seen bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChange {
    /// No token was held before
    Captured,
    /// A different token replaced the held one
    Rotated,
    /// Same token as held; nothing written
    Unchanged,
}

/// Captured before an async lookup; `commit` refuses it if a clear happened
/// since, or if newer cookies were stored in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    epoch: u64,
    version: u64,
}

impl WriteTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Writer handle. Cloning shares the same underlying state.
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    /// Merge fields into the session and stamp it.
    pub fn update(&self, update: SessionUpdate) -> SessionStatus {
        let mut state = self.state.write();
        state.merge(update);

        tracing::debug!(
            version = state.version,
            is_valid = state.is_valid,
            "Session updated"
        );

        state.status()
    }

    /// Store `token` unless it is already the held one.
    ///
    /// The comparison and the write happen under the same lock, so a burst of
    /// requests carrying the same token produces exactly one write.
    pub fn replace_token(&self, token: &str) -> TokenChange {
        if token.is_empty() {
            return TokenChange::Unchanged;
        }

        let mut state = self.state.write();
        let change = match state.bearer_token.as_ref() {
            Some(held) if held.expose() == token => return TokenChange::Unchanged,
            Some(_) => TokenChange::Rotated,
            None => TokenChange::Captured,
        };

        state.merge(SessionUpdate {
            bearer_token: Some(Secret::new(token)),
            ..Default::default()
        });

        tracing::info!(version = state.version, ?change, "Bearer token stored");

        change
    }

    pub fn begin_write(&self) -> WriteTicket {
        let state = self.state.read();
        WriteTicket {
            epoch: state.epoch,
            version: state.version,
        }
    }

    /// Merge `update` only if no clear happened since `ticket` was taken and,
    /// for cookie writes, no cookies were stored after it.
    pub fn commit(&self, ticket: WriteTicket, update: SessionUpdate) -> Result<SessionStatus> {
        let mut state = self.state.write();
        if state.epoch != ticket.epoch {
            return Err(SessionError::StaleWrite {
                ticket_epoch: ticket.epoch,
                current_epoch: state.epoch,
            });
        }
        if update.cookies.is_some() && state.cookies_version > ticket.version {
            return Err(SessionError::Superseded {
                ticket_version: ticket.version,
                stored_version: state.cookies_version,
            });
        }

        state.merge(update);
        Ok(state.status())
    }

    /// Drop every credential. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let had_credentials = state.bearer_token.is_some() || state.cookies.is_some();
        state.reset();

        if had_credentials {
            tracing::info!(epoch = state.epoch, "Session cleared");
        } else {
            tracing::debug!(epoch = state.epoch, "Session clear on empty session");
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status()
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Read-only handle for components that must not mutate the session.
    pub fn view(&self) -> SessionView {
        SessionView {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read-only access to the session.
#[derive(Clone)]
pub struct SessionView {
    state: Arc<RwLock<SessionState>>,
}

impl SessionView {
    pub fn status(&self) -> SessionStatus {
        self.state.read().status()
    }

    pub fn is_valid(&self) -> bool {
        self.state.read().is_valid
    }

    /// Snapshot of the full state for header building inside this crate.
    pub(crate) fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }
}

impl std::fmt::Debug for SessionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionView")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_then_clear() {
        let store = SessionStore::new();
        assert!(!store.status().is_valid);

        let status = store.update(SessionUpdate::token("abc123"));
        assert!(status.is_valid);
        assert!(status.has_bearer_token);
        assert!(status.last_updated.is_some());

        store.clear();
        let status = store.status();
        assert!(!status.is_valid);
        assert!(!status.has_bearer_token);
        assert!(!status.has_cookies);
        assert!(status.last_updated.is_none());
    }

    #[test]
    fn test_valid_iff_last_op_was_update() {
        let store = SessionStore::new();
        let ops = [true, true, false, true, false, false, true];

        for is_update in ops {
            if is_update {
                store.update(SessionUpdate::token("tok"));
            } else {
                store.clear();
            }
            assert_eq!(store.status().is_valid, is_update);
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = SessionStore::new();
        store.update(SessionUpdate::token("abc123"));

        store.clear();
        let once = store.status();
        store.clear();
        let twice = store.status();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_token_is_idempotent() {
        let store = SessionStore::new();

        assert_eq!(store.replace_token("abc123"), TokenChange::Captured);
        let version = store.version();
        let stamped = store.status().last_updated;

        assert_eq!(store.replace_token("abc123"), TokenChange::Unchanged);
        assert_eq!(store.replace_token("abc123"), TokenChange::Unchanged);
        assert_eq!(store.version(), version);
        assert_eq!(store.status().last_updated, stamped);

        assert_eq!(store.replace_token("def456"), TokenChange::Rotated);
        assert!(store.version() > version);
    }

    #[test]
    fn test_last_updated_is_monotonic() {
        let store = SessionStore::new();
        let first = store.update(SessionUpdate::token("a")).last_updated.unwrap();
        let second = store.update(SessionUpdate::token("b")).last_updated.unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_commit_rejects_ticket_from_before_clear() {
        let store = SessionStore::new();
        store.replace_token("abc123");

        let ticket = store.begin_write();
        store.clear();

        let result = store.commit(ticket, SessionUpdate::cookies("FedAuth=1", "x.com"));
        assert_eq!(
            result,
            Err(SessionError::StaleWrite {
                ticket_epoch: 0,
                current_epoch: 1
            })
        );
        assert!(!store.status().has_cookies);
    }

    #[test]
    fn test_commit_survives_concurrent_update() {
        let store = SessionStore::new();
        let ticket = store.begin_write();
        store.replace_token("abc123");

        let status = store
            .commit(ticket, SessionUpdate::cookies("FedAuth=1", "x.com"))
            .unwrap();
        assert!(status.has_cookies);
        assert!(status.is_valid);
    }

    #[test]
    fn test_commit_rejects_older_cookie_set() {
        let store = SessionStore::new();
        store.replace_token("abc123");

        let slow = store.begin_write();
        store.replace_token("def456");
        let fast = store.begin_write();
        store
            .commit(fast, SessionUpdate::cookies("FedAuth=new", "x.com"))
            .unwrap();

        let result = store.commit(slow, SessionUpdate::cookies("FedAuth=old", "x.com"));
        assert!(matches!(result, Err(SessionError::Superseded { .. })));

        let held = store.view().snapshot().cookies.unwrap();
        assert_eq!(held.expose(), "FedAuth=new");
    }

    #[test]
    fn test_view_reads_same_state() {
        let store = SessionStore::new();
        let view = store.view();
        assert!(!view.is_valid());

        store.replace_token("abc123");
        assert!(view.is_valid());
        assert_eq!(view.status(), store.status());
    }
}
