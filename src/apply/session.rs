//! Application sessions: the per-user state machine and the registry that
//! owns every in-flight session.
//!
//! ```text
//!              EditRequested / NameSubmitted
//!                  ┌────────┐
//!                  ▼        │
//!            ┌────────────┐─┘  Confirm   ┌────────────┐  BeginVerify  ┌───────────┐
//!  start ───►│ Collecting ├─────────────►│ Confirming ├──────────────►│ Verifying │
//!            └─────┬──────┘              └─────┬──────┘               └─────┬─────┘
//!                  │ Cancel / Supersede        │ Cancel / Supersede         │ Finish / Supersede
//!                  ▼                           ▼                            ▼
//!            ┌──────────────────────────────────────────────────────────────────┐
//!            │                             Terminal                             │
//!            └──────────────────────────────────────────────────────────────────┘
//! ```

use crate::bus::{SubscriptionHandle, Topic};
use crate::metrics;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use whitelist_proto::InteractionHandle;

/// Where a session is in the application flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Form shown; the name may be edited any number of times.
    Collecting,
    /// Confirm accepted, form replaced by the progress notice.
    Confirming,
    /// Verification running; no longer cancellable.
    Verifying,
    Terminal,
}

/// Named session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    EditRequested,
    NameSubmitted,
    Confirm,
    BeginVerify,
    Finish,
    Cancel,
    Supersede,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {transition:?} in state {from:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub transition: Transition,
}

impl SessionState {
    /// The state reached by applying `transition`.
    pub fn apply(self, transition: Transition) -> Result<SessionState, InvalidTransition> {
        use SessionState::*;
        use Transition::*;

        let next = match (self, transition) {
            (Collecting, EditRequested | NameSubmitted) => Collecting,
            (Collecting, Confirm) => Confirming,
            (Confirming, BeginVerify) => Verifying,
            (Verifying, Finish) => Terminal,
            (Collecting | Confirming, Cancel) => Terminal,
            (Collecting | Confirming | Verifying, Supersede) => Terminal,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminal
    }
}

/// One in-flight application.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSession {
    /// Distinguishes this session from earlier ones of the same user.
    pub session_id: u64,
    pub requesting_user_id: String,
    /// Requester's display name, shown on the form.
    pub requester_name: String,
    pub target_server_id: String,
    pub claimed_name: Option<String>,
    /// Reply that carries the form; edited for later notices.
    pub origin: InteractionHandle,
    pub state: SessionState,
    /// Bus subscriptions owned by this session.
    pub subscriptions: Vec<SubscriptionHandle>,
}

impl ApplicationSession {
    pub fn new(
        session_id: u64,
        requesting_user_id: impl Into<String>,
        requester_name: impl Into<String>,
        target_server_id: impl Into<String>,
        claimed_name: Option<String>,
        origin: InteractionHandle,
    ) -> Self {
        Self {
            session_id,
            requesting_user_id: requesting_user_id.into(),
            requester_name: requester_name.into(),
            target_server_id: target_server_id.into(),
            claimed_name,
            origin,
            state: SessionState::Collecting,
            subscriptions: Vec::new(),
        }
    }

    /// Apply `transition`, leaving the state untouched when it is illegal.
    pub fn advance(&mut self, transition: Transition) -> Result<SessionState, InvalidTransition> {
        self.state = self.state.apply(transition)?;
        Ok(self.state)
    }

    /// Detach the subscriptions for `topics`, keeping the rest.
    pub fn take_subscriptions(&mut self, topics: &[Topic]) -> Vec<SubscriptionHandle> {
        let (taken, kept) = std::mem::take(&mut self.subscriptions)
            .into_iter()
            .partition(|h| topics.contains(&h.topic()));
        self.subscriptions = kept;
        taken
    }
}

/// Owner of every live session, keyed by requesting user.
///
/// At most one session exists per user. Mutations name the `session_id` they
/// expect so a handler left over from a superseded session cannot touch its
/// successor.
pub struct SessionRegistry {
    sessions: DashMap<String, ApplicationSession>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Install `session`, returning the session it replaces.
    pub fn insert(&self, session: ApplicationSession) -> Option<ApplicationSession> {
        let previous = self
            .sessions
            .insert(session.requesting_user_id.clone(), session);
        metrics::set_active_sessions(self.sessions.len());
        previous
    }

    /// Snapshot of the user's session, whatever its id.
    #[cfg(test)]
    pub fn get(&self, user_id: &str) -> Option<ApplicationSession> {
        self.sessions.get(user_id).map(|s| s.value().clone())
    }

    /// Snapshot of the user's session if it is still `session_id`.
    pub fn current(&self, user_id: &str, session_id: u64) -> Option<ApplicationSession> {
        self.sessions
            .get(user_id)
            .filter(|s| s.session_id == session_id)
            .map(|s| s.value().clone())
    }

    /// Mutate the session in place if it is still `session_id`.
    pub fn update<R>(
        &self,
        user_id: &str,
        session_id: u64,
        f: impl FnOnce(&mut ApplicationSession) -> R,
    ) -> Option<R> {
        let mut session = self.sessions.get_mut(user_id)?;
        if session.session_id != session_id {
            return None;
        }
        Some(f(session.value_mut()))
    }

    /// Apply a terminal `transition` and remove the session in one step.
    ///
    /// `Ok(None)` when the session is gone, was replaced, or the transition
    /// did not end it; `Err` leaves the session registered.
    pub fn finish(
        &self,
        user_id: &str,
        session_id: u64,
        transition: Transition,
    ) -> Result<Option<ApplicationSession>, InvalidTransition> {
        let removed = match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) if entry.get().session_id == session_id => {
                let state = entry.get_mut().advance(transition)?;
                state.is_terminal().then(|| entry.remove())
            }
            _ => None,
        };
        metrics::set_active_sessions(self.sessions.len());
        Ok(removed)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
