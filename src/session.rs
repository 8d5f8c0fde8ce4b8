//! Per-user conversation session state and the process-wide session store.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use teloxide::types::UserId;

/// The conversation state of one user's application attempt.
///
/// Exactly one variant is active at a time; an absent session is equivalent
/// to `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AskingQuestions,
    AwaitingPhoto,
    ConfirmCancelExisting,
    ConfirmGlobalCancel,
}

/// The state a declined cancel confirmation returns to.
///
/// Only meaningful while the session sits in one of the two confirm states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeState {
    AskingQuestions,
    AwaitingPhoto,
}

/// Mutable scratch state for one in-progress application attempt
#[derive(Debug, Clone)]
pub struct Session {
    pub state: ConversationState,
    /// Monotonically non-decreasing while asking questions
    pub current_question_index: usize,
    /// Set immediately before prompting, consumed on answer
    pub current_question_id: Option<String>,
    /// Answer text keyed by question id, stored verbatim
    pub answers: HashMap<String, String>,
    /// Temporary photo files collected for this attempt
    pub photo_paths: Vec<PathBuf>,
    pub resume_state: Option<ResumeState>,
    /// Legacy marker; read only by the resume fallback when `resume_state` is absent
    pub awaiting_photo: bool,
    /// Resolved once per session, immutable thereafter
    pub cached_lang: Option<String>,
    pub last_activity: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: ConversationState::Idle,
            current_question_index: 0,
            current_question_id: None,
            answers: HashMap::new(),
            photo_paths: Vec::new(),
            resume_state: None,
            awaiting_photo: false,
            cached_lang: None,
            last_activity: Instant::now(),
        }
    }
}

impl Session {
    /// Whether an application attempt is in progress
    pub fn is_active(&self) -> bool {
        self.state != ConversationState::Idle
    }

    /// Clear all per-attempt scratch state. The cached language survives,
    /// it belongs to the session, not the attempt.
    pub fn reset_attempt(&mut self) {
        self.current_question_index = 0;
        self.current_question_id = None;
        self.answers.clear();
        self.photo_paths.clear();
        self.resume_state = None;
        self.awaiting_photo = false;
    }
}

/// Process-wide session store keyed by user id.
///
/// Teloxide's dispatcher delivers one chat's updates sequentially, so a
/// given user's session is never mutated from two handler invocations at
/// once; the mutex only guards against the timeout watcher.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the user's session, creating an idle one if absent.
    /// The last-activity marker is refreshed.
    pub fn with_session<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(user_id).or_default();
        session.last_activity = Instant::now();
        f(session)
    }

    /// Read-only peek at an existing session; does not create one
    pub fn inspect<R>(&self, user_id: UserId, f: impl FnOnce(&Session) -> R) -> Option<R> {
        let sessions = self.sessions.lock();
        sessions.get(&user_id).map(f)
    }

    /// Refresh the inactivity marker of an existing session
    pub fn touch(&self, user_id: UserId) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&user_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Remove and return the user's session
    pub fn remove(&self, user_id: UserId) -> Option<Session> {
        self.sessions.lock().remove(&user_id)
    }

    /// Drop the session entry when it carries no in-progress attempt
    pub fn remove_if_idle(&self, user_id: UserId) {
        let mut sessions = self.sessions.lock();
        if sessions.get(&user_id).is_some_and(|s| !s.is_active()) {
            sessions.remove(&user_id);
        }
    }

    /// Atomically remove every session idle for longer than `max_idle`.
    ///
    /// Removal-before-notification is what guarantees cleanup runs exactly
    /// once per attempt: a message handler racing the watcher finds no
    /// session and treats the user as idle.
    pub fn take_expired(&self, max_idle: Duration) -> Vec<(UserId, Session)> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let expired: Vec<UserId> = sessions
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_activity) >= max_idle)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id).map(|s| (id, s)))
            .collect()
    }

    /// Number of sessions currently held
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults_to_idle() {
        let session = Session::default();
        assert_eq!(session.state, ConversationState::Idle);
        assert!(!session.is_active());
    }

    #[test]
    fn test_reset_attempt_keeps_cached_lang() {
        let mut session = Session {
            cached_lang: Some("ru".to_string()),
            current_question_index: 3,
            awaiting_photo: true,
            ..Default::default()
        };
        session.answers.insert("q1".into(), "hello".into());
        session.photo_paths.push(PathBuf::from("p.jpg"));

        session.reset_attempt();

        assert_eq!(session.current_question_index, 0);
        assert!(session.answers.is_empty());
        assert!(session.photo_paths.is_empty());
        assert!(!session.awaiting_photo);
        assert_eq!(session.cached_lang.as_deref(), Some("ru"));
    }

    #[test]
    fn test_store_creates_and_removes() {
        let store = SessionStore::new();
        let user = UserId(7);

        store.with_session(user, |s| s.state = ConversationState::AskingQuestions);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.inspect(user, |s| s.state),
            Some(ConversationState::AskingQuestions)
        );

        let removed = store.remove(user).unwrap();
        assert_eq!(removed.state, ConversationState::AskingQuestions);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_if_idle_keeps_active_sessions() {
        let store = SessionStore::new();
        let user = UserId(7);

        store.with_session(user, |s| s.state = ConversationState::AwaitingPhoto);
        store.remove_if_idle(user);
        assert_eq!(store.len(), 1);

        store.with_session(user, |s| s.state = ConversationState::Idle);
        store.remove_if_idle(user);
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_expired_removes_only_idle_sessions() {
        let store = SessionStore::new();
        store.with_session(UserId(1), |s| s.state = ConversationState::AskingQuestions);
        store.with_session(UserId(2), |s| s.state = ConversationState::AwaitingPhoto);

        // Nothing has been idle for an hour
        assert!(store.take_expired(Duration::from_secs(3600)).is_empty());
        assert_eq!(store.len(), 2);

        // Everything has been idle for zero seconds
        let expired = store.take_expired(Duration::ZERO);
        assert_eq!(expired.len(), 2);
        assert!(store.is_empty());
    }
}
