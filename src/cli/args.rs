//! Command-line construction for one Claude Code invocation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::TempPath;

use crate::config::{McpServerConfig, SessionConfig};

/// Output format requested from the CLI.
pub const OUTPUT_FORMAT: &str = "stream-json";

/// Permission mode that lets the CLI run without interactive approval.
pub const PERMISSION_MODE: &str = "bypassPermissions";

/// Error type for argument construction.
#[derive(thiserror::Error, Debug)]
pub enum ArgsError {
    /// A configuration blob could not be serialized.
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The MCP config file could not be written.
    #[error("Failed to write MCP config file: {0}")]
    WriteMcpConfig(#[source] std::io::Error),
}

/// Arguments for one invocation, plus the files they reference.
///
/// The MCP config file (if any) is removed when this value is dropped, so it
/// must outlive the spawned process.
#[derive(Debug)]
pub struct InvocationArgs {
    pub args: Vec<String>,
    mcp_config: Option<TempPath>,
}

impl InvocationArgs {
    /// Path of the materialized MCP config file.
    #[must_use]
    pub fn mcp_config_path(&self) -> Option<&Path> {
        self.mcp_config.as_deref()
    }

    /// Split into the argument list and the file guard.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Option<TempPath>) {
        (self.args, self.mcp_config)
    }
}

#[derive(Serialize)]
struct McpConfigFile<'a> {
    #[serde(rename = "mcpServers")]
    mcp_servers: &'a BTreeMap<String, McpServerConfig>,
}

/// Render the MCP config file body.
///
/// # Errors
///
/// Returns `ArgsError::Serialize` if the servers cannot be serialized.
pub fn mcp_config_json(servers: &BTreeMap<String, McpServerConfig>) -> Result<String, ArgsError> {
    serde_json::to_string(&McpConfigFile {
        mcp_servers: servers,
    })
    .map_err(|source| ArgsError::Serialize {
        what: "MCP config",
        source,
    })
}

fn write_mcp_config(servers: &BTreeMap<String, McpServerConfig>) -> Result<TempPath, ArgsError> {
    let body = mcp_config_json(servers)?;
    let mut file = tempfile::Builder::new()
        .prefix("claude-mcp-")
        .suffix(".json")
        .tempfile()
        .map_err(ArgsError::WriteMcpConfig)?;
    file.write_all(body.as_bytes())
        .and_then(|()| file.flush())
        .map_err(ArgsError::WriteMcpConfig)?;
    let path = file.into_temp_path();
    tracing::debug!(path = %path.display(), servers = servers.len(), "Wrote MCP config");
    Ok(path)
}

/// Build the command-line arguments for one invocation.
///
/// The prompt is always the final argument. When `resume` is set, the
/// resume directive precedes every turn-specific flag.
///
/// # Errors
///
/// Returns `ArgsError` if the MCP config file or agent definitions cannot be
/// materialized.
pub fn build_args(
    config: &SessionConfig,
    prompt: &str,
    resume: Option<&str>,
) -> Result<InvocationArgs, ArgsError> {
    let mut args = vec![
        "--print".to_string(),
        "--output-format".to_string(),
        OUTPUT_FORMAT.to_string(),
        "--verbose".to_string(),
        "--permission-mode".to_string(),
        PERMISSION_MODE.to_string(),
    ];

    if let Some(session_id) = resume {
        args.push("--resume".to_string());
        args.push(session_id.to_string());
    }

    args.push("--model".to_string());
    args.push(config.effective_model().to_string());

    if let Some(prompt) = &config.system_prompt {
        args.push("--system-prompt".to_string());
        args.push(prompt.clone());
    }

    if let Some(prompt) = &config.append_system_prompt {
        args.push("--append-system-prompt".to_string());
        args.push(prompt.clone());
    }

    let mcp_config = if config.mcp_servers.is_empty() {
        None
    } else {
        let path = write_mcp_config(&config.mcp_servers)?;
        args.push("--mcp-config".to_string());
        args.push(path.to_string_lossy().into_owned());
        args.push("--strict-mcp-config".to_string());
        Some(path)
    };

    if !config.agents.is_empty() {
        let agents =
            serde_json::to_string(&config.agents).map_err(|source| ArgsError::Serialize {
                what: "agent definitions",
                source,
            })?;
        args.push("--agents".to_string());
        args.push(agents);
    }

    if config.include_partial_messages {
        args.push("--include-partial-messages".to_string());
    }

    if let Some(turns) = config.max_turns {
        args.push("--max-turns".to_string());
        args.push(turns.to_string());
    }

    if !config.allowed_tools.is_empty() {
        args.push("--allowedTools".to_string());
        args.push(config.allowed_tools.join(","));
    }

    if !config.disallowed_tools.is_empty() {
        args.push("--disallowedTools".to_string());
        args.push(config.disallowed_tools.join(","));
    }

    args.push(prompt.to_string());

    Ok(InvocationArgs { args, mcp_config })
}
