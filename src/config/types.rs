//! Configuration types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Model used when the configuration does not name one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Executable looked up on `PATH` when no explicit path is configured.
pub const DEFAULT_EXECUTABLE: &str = "claude";

/// Launch description for one MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command that starts the server.
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl McpServerConfig {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A custom sub-agent passed through `--agents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// When the main agent should delegate to this one.
    pub description: String,
    /// System prompt for the sub-agent.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Configuration used to spawn every invocation of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the Claude Code executable. Falls back to `claude` on `PATH`.
    pub executable: Option<PathBuf>,
    /// Working directory for the spawned process.
    pub cwd: Option<PathBuf>,
    /// Model selector. Falls back to [`DEFAULT_MODEL`].
    pub model: Option<String>,
    /// Replaces the default system prompt.
    pub system_prompt: Option<String>,
    /// Appended to the default system prompt.
    pub append_system_prompt: Option<String>,
    /// MCP servers, written to a strict `--mcp-config` file when non-empty.
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    /// Custom agent definitions, serialized into `--agents`.
    pub agents: BTreeMap<String, AgentDefinition>,
    /// Ask the CLI to also emit partial message records.
    pub include_partial_messages: bool,
    pub max_turns: Option<u32>,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    /// Mirror stderr and report dropped records at a visible log level.
    pub verbose: bool,
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executable to spawn instead of `claude` from `PATH`.
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Set the working directory for the Claude process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set a custom system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Append to the system prompt.
    #[must_use]
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.append_system_prompt = Some(prompt.into());
        self
    }

    /// Register an MCP server under `name`.
    #[must_use]
    pub fn mcp_server(mut self, name: impl Into<String>, server: McpServerConfig) -> Self {
        self.mcp_servers.insert(name.into(), server);
        self
    }

    /// Register a custom agent under `name`.
    #[must_use]
    pub fn agent(mut self, name: impl Into<String>, agent: AgentDefinition) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    #[must_use]
    pub fn include_partial_messages(mut self, enabled: bool) -> Self {
        self.include_partial_messages = enabled;
        self
    }

    /// Set the maximum number of turns.
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Set the allowed tools for this session.
    #[must_use]
    pub fn allowed_tools(mut self, tools: &[&str]) -> Self {
        self.allowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn disallowed_tools(mut self, tools: &[&str]) -> Self {
        self.disallowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The model that will be passed to `--model`.
    #[must_use]
    pub fn effective_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The executable that will be spawned.
    #[must_use]
    pub fn effective_executable(&self) -> &Path {
        self.executable
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_EXECUTABLE))
    }
}
