//! Per-connection context resolution state.
//!
//! A session starts unresolved and runs retrieval on every message until one
//! returns matches. The top match's movie and dialogue context are then
//! locked for the life of the connection; later turns reuse them without
//! touching the retrieval path. There is no way to pivot to another movie
//! inside the same session.

use crate::index::QueryMatch;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    Unresolved,
    Resolved {
        movie_title: String,
        dialogue_context: String,
    },
}

/// Context-resolution state for one chat session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: Uuid,
    state: SessionState,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: SessionState::Unresolved,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the next message should run retrieval.
    pub fn needs_retrieval(&self) -> bool {
        matches!(self.state, SessionState::Unresolved)
    }

    /// Lock onto the top match. Returns `true` only on the transition from
    /// unresolved to resolved; an empty match set or an already resolved
    /// session leaves the state untouched.
    pub fn resolve_from(&mut self, matches: &[QueryMatch]) -> bool {
        if !self.needs_retrieval() {
            return false;
        }

        let Some(top) = matches.first() else {
            return false;
        };

        self.state = SessionState::Resolved {
            movie_title: top.movie_title.clone(),
            dialogue_context: top.text.clone(),
        };
        true
    }

    pub fn movie_title(&self) -> Option<&str> {
        match &self.state {
            SessionState::Resolved { movie_title, .. } => Some(movie_title),
            SessionState::Unresolved => None,
        }
    }

    pub fn dialogue_context(&self) -> Option<&str> {
        match &self.state {
            SessionState::Resolved {
                dialogue_context, ..
            } => Some(dialogue_context),
            SessionState::Unresolved => None,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heat_match() -> QueryMatch {
        QueryMatch {
            id: "Heat_0".to_string(),
            score: 0.92,
            movie_title: "Heat".to_string(),
            text: "I do what I do best".to_string(),
        }
    }

    fn alien_match() -> QueryMatch {
        QueryMatch {
            id: "Alien_0".to_string(),
            score: 0.88,
            movie_title: "Alien".to_string(),
            text: "In space no one can hear you".to_string(),
        }
    }

    #[test]
    fn test_new_session_is_unresolved() {
        let session = SessionContext::new();
        assert!(session.needs_retrieval());
        assert!(session.movie_title().is_none());
        assert!(session.dialogue_context().is_none());
    }

    #[test]
    fn test_empty_matches_leave_session_unresolved() {
        let mut session = SessionContext::new();
        assert!(!session.resolve_from(&[]));
        assert!(session.needs_retrieval());
    }

    #[test]
    fn test_first_match_locks_context() {
        let mut session = SessionContext::new();
        assert!(session.resolve_from(&[heat_match()]));
        assert!(!session.needs_retrieval());
        assert_eq!(session.movie_title(), Some("Heat"));
        assert_eq!(session.dialogue_context(), Some("I do what I do best"));
    }

    #[test]
    fn test_resolved_session_never_relocks() {
        let mut session = SessionContext::new();
        assert!(session.resolve_from(&[heat_match()]));

        // A later match set must not displace the locked movie.
        assert!(!session.resolve_from(&[alien_match()]));
        assert_eq!(session.movie_title(), Some("Heat"));
        assert_eq!(session.dialogue_context(), Some("I do what I do best"));
    }
}
