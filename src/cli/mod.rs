//! CLI module for Claude Code process spawning and stream parsing.

mod args;
mod events;
mod process;
mod stream;

pub use args::*;
pub use events::*;
pub use process::*;
pub use stream::*;
