//! Session runner for multi-turn conversations with Claude Code.
//!
//! Each [`Session::send`] spawns one Claude Code invocation, resuming the
//! session identity captured from the previous invocation's init event.
//! [`Session::stream`] then drains that invocation's events. A session owns
//! at most one invocation at a time.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::Stream;

use crate::cli::{
    build_args, event_stream, ArgsError, ClaudeEvent, ClaudeProcess, ContentBlock, EventStream,
    SpawnError,
};
use crate::config::SessionConfig;
use crate::session::{SessionState, SessionStateMachine, SessionStats};

/// Error type for session operations.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// `send` was called while a previous turn was still in flight.
    #[error("A turn is already in flight; drain its stream before sending again")]
    AlreadyActive,
    /// `stream` was called with no turn in flight.
    #[error("No turn in flight; call send first")]
    NotActive,
    /// The session was closed.
    #[error("Session is closed")]
    Closed,
    /// Arguments could not be built.
    #[error(transparent)]
    Args(#[from] ArgsError),
    /// The Claude process could not be started or failed.
    #[error("Claude process failed: {0}")]
    Spawn(#[from] SpawnError),
}

/// Options for [`Session::stream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Surface only assistant text, tool invocations, and the result.
    pub filtered: bool,
}

impl StreamOptions {
    /// Options that hide init, thinking, and tool-result events.
    #[must_use]
    pub fn filtered() -> Self {
        Self { filtered: true }
    }

    /// Apply the filter to one event, returning what the caller should see.
    #[must_use]
    pub fn apply(self, event: ClaudeEvent) -> Option<ClaudeEvent> {
        if !self.filtered {
            return Some(event);
        }

        match event {
            ClaudeEvent::Assistant(mut assistant) => {
                assistant.message.content.retain(|block| {
                    matches!(block, ContentBlock::Text { .. } | ContentBlock::ToolUse(_))
                });
                if assistant.message.content.is_empty() {
                    None
                } else {
                    Some(ClaudeEvent::Assistant(assistant))
                }
            }
            event @ ClaudeEvent::Result(_) => Some(event),
            _ => None,
        }
    }
}

/// One spawned invocation and its undrained output.
struct Invocation {
    process: ClaudeProcess,
    events: EventStream,
    saw_init: bool,
}

/// A conversation bound to one Claude Code session identity.
pub struct Session {
    config: SessionConfig,
    session_id: Option<String>,
    state: SessionStateMachine,
    active: Option<Invocation>,
    /// Most recently drained invocation, kept for its exit code.
    finished: Option<ClaudeProcess>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("state", &self.state.state())
            .field("pid", &self.active.as_ref().and_then(|i| i.process.id()))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a fresh session with no identity.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session_id: None,
            state: SessionStateMachine::new(),
            active: None,
            finished: None,
        }
    }

    /// Create a session that resumes an existing identity on its first send.
    #[must_use]
    pub fn resume(session_id: impl Into<String>, config: SessionConfig) -> Self {
        let mut session = Self::new(config);
        session.session_id = Some(session_id.into());
        session
    }

    /// Spawn an invocation for `text`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if the previous turn has not been
    /// drained, `SessionError::Closed` after [`close`](Self::close), and
    /// `Args`/`Spawn` errors if the process cannot be started.
    pub fn send(&mut self, text: &str) -> Result<(), SessionError> {
        match self.state.state() {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Active => return Err(SessionError::AlreadyActive),
            SessionState::Idle => {}
        }

        self.finished = None;

        let invocation = build_args(&self.config, text, self.session_id.as_deref())?;
        let mut process = ClaudeProcess::spawn(&self.config, invocation)?;
        let Some(stdout) = process.take_stdout() else {
            process.kill();
            return Err(SpawnError::NoStdout.into());
        };

        tracing::info!(
            resume = ?self.session_id,
            pid = ?process.id(),
            "Started Claude invocation"
        );

        self.active = Some(Invocation {
            process,
            events: event_stream(stdout, self.config.verbose),
            saw_init: false,
        });
        self.state.record_spawn();
        Ok(())
    }

    /// Stream the in-flight invocation's events.
    ///
    /// The returned stream borrows the session until it is dropped. Once it
    /// is exhausted the session returns to idle and can send again. Dropping
    /// it early leaves the turn in flight; a later call continues from the
    /// next undelivered event.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` if nothing was sent, or
    /// `SessionError::Closed` after [`close`](Self::close).
    pub fn stream(&mut self, options: StreamOptions) -> Result<SessionStream<'_>, SessionError> {
        match self.state.state() {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Idle => Err(SessionError::NotActive),
            SessionState::Active => Ok(SessionStream {
                session: self,
                options,
            }),
        }
    }

    /// The most recently captured session identity.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Exit code of the most recently drained invocation.
    ///
    /// Returns `Ok(None)` if no invocation has been drained since the last
    /// send. Waits for the process if it has not exited yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Spawn` if the process was killed by a signal or
    /// could not be waited on.
    pub async fn last_exit_code(&mut self) -> Result<Option<i32>, SessionError> {
        match self.finished.as_mut() {
            Some(process) => Ok(Some(process.wait().await?)),
            None => Ok(None),
        }
    }

    /// Kill any in-flight invocation and close the session.
    ///
    /// Does not wait for the process to exit. Idempotent.
    pub fn close(&mut self) {
        if self.state.state() == SessionState::Closed {
            return;
        }
        if let Some(mut invocation) = self.active.take() {
            invocation.process.kill();
        }
        if let Some(mut process) = self.finished.take() {
            process.kill();
        }
        self.state.transition(SessionState::Closed);
    }

    /// Terminate any in-flight invocation gracefully, then close.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Spawn` if termination fails. The session is
    /// closed either way.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<(), SessionError> {
        let outcome = match self.active.as_mut() {
            Some(invocation) => invocation
                .process
                .graceful_terminate(grace)
                .await
                .map_err(|e| SessionError::Spawn(e.into())),
            None => Ok(()),
        };
        self.close();
        outcome
    }

    fn observe(&mut self, event: &ClaudeEvent) {
        match event {
            ClaudeEvent::System(_) => {
                let Some(init) = event.as_init() else { return };
                let Some(invocation) = self.active.as_mut() else {
                    return;
                };
                if invocation.saw_init {
                    return;
                }
                invocation.saw_init = true;
                if self.session_id.as_deref() != Some(init.session_id.as_str()) {
                    tracing::info!(
                        session_id = %init.session_id,
                        previous = ?self.session_id,
                        model = %init.model,
                        "Captured session identity"
                    );
                }
                self.session_id = Some(init.session_id.clone());
            }
            ClaudeEvent::Result(result) => {
                tracing::info!(
                    subtype = result.subtype.as_str(),
                    cost_usd = result.total_cost_usd,
                    num_turns = result.num_turns,
                    "Turn finished"
                );
            }
            _ => {}
        }
    }

    fn complete_invocation(&mut self) {
        if let Some(invocation) = self.active.take() {
            if !invocation.saw_init {
                tracing::warn!("Claude invocation ended without an init event");
            }
            self.finished = Some(invocation.process);
            self.state.record_completion();
        }
    }
}

/// Events of one in-flight invocation, borrowed from its [`Session`].
pub struct SessionStream<'a> {
    session: &'a mut Session,
    options: StreamOptions,
}

impl fmt::Debug for SessionStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStream")
            .field("session", &self.session)
            .field("options", &self.options)
            .finish()
    }
}

impl Stream for SessionStream<'_> {
    type Item = ClaudeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            let Some(invocation) = this.session.active.as_mut() else {
                return Poll::Ready(None);
            };

            match invocation.events.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.session.complete_invocation();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(event)) => {
                    this.session.observe(&event);
                    if let Some(event) = this.options.apply(event) {
                        return Poll::Ready(Some(event));
                    }
                }
            }
        }
    }
}
