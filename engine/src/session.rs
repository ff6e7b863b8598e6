use crate::error::EngineError;
use crate::error::Result;
use log::debug;
use lore_protocol::SessionState;

/// Explicit query-lifecycle state machine, owned by the engine instance so
/// separate engines (for example in tests) never interfere.
///
/// ```text
/// BOOTSTRAP -> INDEX_READY -> SEARCH_EXECUTING -> RESULT_FOUND
///                   ^                |          \-> RESULT_MISSING
///                   |                \-> ERROR ----^
///                   \---- reset_after_error ------/
/// ```
///
/// Terminal result states cycle back through SEARCH_EXECUTING on the next
/// query. RESULT_FOUND and RESULT_MISSING are mutually exclusive per query.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Bootstrap,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Even partial backend initialization reaches INDEX_READY; collection
    /// availability is evaluated per-collection, not globally.
    pub fn mark_index_ready(&mut self) -> Result<()> {
        self.transition(SessionState::Bootstrap, SessionState::IndexReady)
    }

    /// A new query cycle. Valid from INDEX_READY or either terminal result
    /// state of the previous cycle.
    pub fn begin_search(&mut self) -> Result<()> {
        match self.state {
            SessionState::IndexReady
            | SessionState::ResultFound
            | SessionState::ResultMissing => {
                debug!("session: {} -> SEARCH_EXECUTING", self.state);
                self.state = SessionState::SearchExecuting;
                Ok(())
            }
            from => Err(EngineError::InvalidTransition {
                from,
                to: SessionState::SearchExecuting,
            }),
        }
    }

    /// At least one hit survived floor filtering.
    pub fn mark_found(&mut self) -> Result<()> {
        self.transition(SessionState::SearchExecuting, SessionState::ResultFound)
    }

    /// Zero hits survived. A first-class terminal state, not an error: it
    /// triggers creation guidance rather than an exception.
    pub fn mark_missing(&mut self) -> Result<()> {
        self.transition(SessionState::SearchExecuting, SessionState::ResultMissing)
    }

    /// Unrecoverable failure during retrieval or composition.
    pub fn mark_error(&mut self) -> Result<()> {
        self.transition(SessionState::SearchExecuting, SessionState::Error)
    }

    /// After the error bundle is emitted the session returns to
    /// INDEX_READY, so a subsequent query is not permanently wedged.
    pub fn reset_after_error(&mut self) -> Result<()> {
        self.transition(SessionState::Error, SessionState::IndexReady)
    }

    fn transition(&mut self, expected: SessionState, to: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!("session: {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_happy_path_cycle() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Bootstrap);

        session.mark_index_ready().expect("bootstrap -> ready");
        session.begin_search().expect("ready -> executing");
        session.mark_found().expect("executing -> found");

        // A new query cycles back through executing.
        session.begin_search().expect("found -> executing");
        session.mark_missing().expect("executing -> missing");
        assert_eq!(session.state(), SessionState::ResultMissing);
    }

    #[test]
    fn test_found_and_missing_are_exclusive() {
        let mut session = Session::new();
        session.mark_index_ready().expect("ready");
        session.begin_search().expect("executing");
        session.mark_found().expect("found");

        // The same cycle cannot also end in RESULT_MISSING.
        assert!(session.mark_missing().is_err());
        assert_eq!(session.state(), SessionState::ResultFound);
    }

    #[test]
    fn test_error_resets_to_index_ready() {
        let mut session = Session::new();
        session.mark_index_ready().expect("ready");
        session.begin_search().expect("executing");
        session.mark_error().expect("executing -> error");
        assert_eq!(session.state(), SessionState::Error);

        session.reset_after_error().expect("error -> ready");
        assert_eq!(session.state(), SessionState::IndexReady);
        session.begin_search().expect("not wedged after error");
    }

    #[test]
    fn test_search_requires_ready() {
        let mut session = Session::new();
        assert!(session.begin_search().is_err());
        assert_eq!(session.state(), SessionState::Bootstrap);
    }

    #[test]
    fn test_double_bootstrap_rejected() {
        let mut session = Session::new();
        session.mark_index_ready().expect("ready");
        assert!(session.mark_index_ready().is_err());
    }
}
