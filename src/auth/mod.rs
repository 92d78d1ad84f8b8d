// auth/mod.rs
// Per-session authentication state and the user registry.
//
// Grounded in the original `LoginSystem`: a process-wide user table plus a
// per-session `(authenticated, user_id)` pair, tracked separately from the
// SRP handshake state in `crate::handshake`.

use std::cell::RefCell;
use std::collections::HashMap;

use database::Persistence;
use log::{debug, warn};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, Default)]
struct SessionAuth {
    authenticated: bool,
    user_id: Option<i32>,
}

#[derive(Debug)]
pub struct LoginSystem<P: Persistence> {
    persistence: P,
    sessions: RefCell<HashMap<u64, SessionAuth>>,
}

impl<P: Persistence> LoginSystem<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            sessions: RefCell::new(HashMap::new()),
        }
    }

    pub fn initialize_session(&self, session_id: u64) {
        self.sessions.borrow_mut().insert(session_id, SessionAuth::default());
    }

    pub fn close_session(&self, session_id: u64) {
        self.sessions.borrow_mut().remove(&session_id);
    }

    pub fn exists(&self, user_name: &str) -> Result<bool, AuthError> {
        Ok(self.persistence.get_user_by_name(user_name)?.is_some())
    }

    /// Creates the user row. The original only fails this on a storage
    /// exception; callers are expected to have checked `exists` first.
    pub fn register_account(&self, user_name: &str, verifier: &str) -> Result<i32, AuthError> {
        self.persistence
            .create_user(user_name, verifier)
            .map_err(|e| {
                warn!("register_account failed for {user_name}: {e:#}");
                AuthError::Failed
            })
    }

    /// Verifies the stored verifier matches and binds `user_id` to the
    /// session (but does not flip `authenticated` — that happens only after
    /// `ChallengeProof` succeeds, via [`Self::login_session`]).
    pub fn login_account(
        &self,
        user_name: &str,
        verifier: &str,
        session_id: u64,
    ) -> Result<(), AuthError> {
        let user = self
            .persistence
            .get_user_by_name(user_name)?
            .ok_or(AuthError::NotFound)?;

        if user.v != verifier {
            return Err(AuthError::Failed);
        }

        let mut sessions = self.sessions.borrow_mut();
        let entry = sessions.entry(session_id).or_default();
        entry.user_id = Some(user.id);
        debug!("session {session_id} bound to user {}", user.id);
        Ok(())
    }

    pub fn login_session(&self, session_id: u64) {
        if let Some(entry) = self.sessions.borrow_mut().get_mut(&session_id) {
            entry.authenticated = true;
        }
    }

    pub fn logout_session(&self, session_id: u64) {
        if let Some(entry) = self.sessions.borrow_mut().get_mut(&session_id) {
            entry.authenticated = false;
        }
    }

    pub fn auth_session(&self, session_id: u64) -> bool {
        self.sessions
            .borrow()
            .get(&session_id)
            .map(|s| s.authenticated)
            .unwrap_or(false)
    }

    pub fn user_id(&self, session_id: u64) -> Option<i32> {
        self.sessions.borrow().get(&session_id).and_then(|s| s.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::MockPersistence;

    #[test]
    fn unauthenticated_session_has_no_user_id() {
        let login = LoginSystem::new(MockPersistence::new());
        login.initialize_session(1);
        assert!(!login.auth_session(1));
        assert_eq!(login.user_id(1), None);
    }

    #[test]
    fn login_account_binds_user_then_login_session_authenticates() {
        let db = MockPersistence::new();
        let login = LoginSystem::new(db);
        login.initialize_session(7);
        login.register_account("alice", "deadbeef").unwrap();
        login.login_account("alice", "deadbeef", 7).unwrap();
        assert!(!login.auth_session(7));
        login.login_session(7);
        assert!(login.auth_session(7));
        assert_eq!(login.user_id(7), Some(1));
    }

    #[test]
    fn login_account_rejects_verifier_mismatch() {
        let db = MockPersistence::new();
        let login = LoginSystem::new(db);
        login.initialize_session(7);
        login.register_account("alice", "deadbeef").unwrap();
        let err = login.login_account("alice", "wrongwrong", 7).unwrap_err();
        assert!(matches!(err, AuthError::Failed));
    }

    #[test]
    fn login_account_rejects_unknown_user() {
        let login = LoginSystem::new(MockPersistence::new());
        login.initialize_session(7);
        let err = login.login_account("ghost", "anything", 7).unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
