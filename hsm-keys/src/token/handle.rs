//! Opaque private key references

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identifies one opened token session within this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh id. Never returns the same value twice in a process.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Reference to a private key held by the token.
///
/// Carries no key material: only the session it was issued by and an index the
/// issuing [`TokenStore`](super::TokenStore) resolves back to its own object.
/// Meaningless once that session is gone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivateKeyHandle {
    session: SessionId,
    index: u32,
}

impl PrivateKeyHandle {
    #[must_use]
    pub const fn new(session: SessionId, index: u32) -> Self {
        Self { session, index }
    }

    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Whether this handle was issued by `session`
    #[must_use]
    pub fn belongs_to(&self, session: SessionId) -> bool {
        self.session == session
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKeyHandle({}#{})", self.session, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b.value() > a.value());
    }

    #[test]
    fn handle_is_scoped_to_session() {
        let session = SessionId::next();
        let other = SessionId::next();
        let handle = PrivateKeyHandle::new(session, 3);
        assert!(handle.belongs_to(session));
        assert!(!handle.belongs_to(other));
        assert_eq!(handle.index(), 3);
    }

    #[test]
    fn handle_debug_shows_only_indices() {
        let session = SessionId::next();
        let handle = PrivateKeyHandle::new(session, 7);
        assert_eq!(
            format!("{handle:?}"),
            format!("PrivateKeyHandle(session-{}#7)", session.value())
        );
    }
}
