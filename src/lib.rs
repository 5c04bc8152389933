//! Claude Session - multi-turn conversations over the Claude Code CLI.
//!
//! Spawns `claude --print --output-format stream-json`, decodes its
//! line-delimited JSON output into typed [`cli::ClaudeEvent`]s, and keeps a
//! session identity across turns by resuming it on every send.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use claude_session::config::SessionConfig;
//! use claude_session::session::{Session, StreamOptions};
//!
//! # async fn run() -> Result<(), claude_session::session::SessionError> {
//! let mut session = Session::new(SessionConfig::default());
//! session.send("Remember the number 7.")?;
//! let mut events = session.stream(StreamOptions::default())?;
//! while let Some(event) = events.next().await {
//!     println!("{event:?}");
//! }
//! drop(events);
//!
//! session.send("Which number did I ask you to remember?")?;
//! let mut events = session.stream(StreamOptions::filtered())?;
//! while let Some(event) = events.next().await {
//!     println!("{event:?}");
//! }
//! drop(events);
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod display;
pub mod session;

pub use config::SessionConfig;
pub use session::{prompt, PromptSummary, Session, SessionError, StreamOptions};
