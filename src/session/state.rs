//! Session state machine.

use serde::{Deserialize, Serialize};

/// Current state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No invocation in flight; ready to send.
    #[default]
    Idle,
    /// One invocation spawned and not yet drained.
    Active,
    /// Terminal; no further sends.
    Closed,
}

/// State machine for tracking session progress.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    invocations: usize,
    completed: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            invocations: 0,
            completed: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    /// Idle -> Active for a freshly spawned invocation.
    pub fn record_spawn(&mut self) {
        self.invocations = self.invocations.saturating_add(1);
        self.transition(SessionState::Active);
    }

    /// Active -> Idle once the invocation's output is drained.
    pub fn record_completion(&mut self) {
        self.completed = self.completed.saturating_add(1);
        self.transition(SessionState::Idle);
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            invocations: self.invocations,
            completed: self.completed,
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub invocations: usize,
    pub completed: usize,
}
