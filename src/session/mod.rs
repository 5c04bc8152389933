//! Multi-turn sessions over one Claude Code session identity.

mod prompt;
mod runner;
mod state;

pub use prompt::*;
pub use runner::*;
pub use state::*;
