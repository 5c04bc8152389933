//! Event types from Claude Code stream-json output.
//!
//! This module defines the records Claude Code emits, one JSON object per
//! line, when running with `--print --output-format stream-json`. Every
//! invocation starts with a `system`/`init` record and ends with a single
//! `result` record; `assistant` and `user` records arrive in between.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Status of one MCP server as reported in the init record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerStatus {
    /// Server name from the MCP configuration.
    pub name: String,
    /// Connection status (e.g., "connected", "failed").
    #[serde(default)]
    pub status: String,
}

/// System initialization event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInit {
    /// Session identifier, usable with `--resume`.
    pub session_id: String,
    /// Current working directory.
    #[serde(default)]
    pub cwd: String,
    /// Available tools for this session.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Connected MCP servers.
    #[serde(default)]
    pub mcp_servers: Vec<McpServerStatus>,
    /// Model identifier in use.
    #[serde(default)]
    pub model: String,
    /// Permission mode in effect.
    #[serde(default, rename = "permissionMode")]
    pub permission_mode: String,
    /// Where the API key came from.
    #[serde(
        default,
        rename = "apiKeySource",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key_source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slash_commands: Vec<String>,
    /// Names of the custom agents available to the session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_code_version: Option<String>,
}

/// A `system` record, discriminated by its `subtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum SystemEvent {
    /// Session initialization, emitted once per invocation.
    Init(SystemInit),
    /// Any other system notice (e.g., compaction boundaries).
    #[serde(other)]
    Other,
}

/// Token usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Add another usage record to this one.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_creation_input_tokens = self
            .cache_creation_input_tokens
            .saturating_add(other.cache_creation_input_tokens);
        self.cache_read_input_tokens = self
            .cache_read_input_tokens
            .saturating_add(other.cache_read_input_tokens);
    }

    /// Total tokens across all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }
}

/// Tool use request data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Unique identifier for this tool use.
    pub id: String,
    /// Name of the tool being invoked.
    pub name: String,
    /// Tool input parameters. Schemas are defined by the tool, so this stays open.
    #[serde(default)]
    pub input: Map<String, Value>,
}

/// One fragment of an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Extended thinking output.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Plain text.
    Text { text: String },
    /// A tool invocation.
    ToolUse(ToolUse),
    /// Catch-all for unknown block types.
    #[serde(other)]
    Unknown,
}

/// Message body of an assistant record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ordered content fragments.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Assistant turn event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantEvent {
    pub message: AssistantMessage,
    /// Set only for turns produced by a sub-agent.
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AssistantEvent {
    /// Concatenated text fragments, or `None` if the turn has no text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }

    /// Tool invocations in this turn, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.message.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }
}

/// Content of a tool result: either a plain string or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<Value>),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ToolResultContent {
    /// Flatten the content to text, joining text blocks with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Tool execution result data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Identifier matching the original tool use.
    pub tool_use_id: String,
    /// Result content from tool execution.
    #[serde(default)]
    pub content: ToolResultContent,
    /// Whether the tool reported a failure.
    #[serde(default)]
    pub is_error: bool,
}

/// One fragment of a user-role record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContent {
    ToolResult(ToolResult),
    Text { text: String },
    #[serde(other)]
    Unknown,
}

/// Message body of a user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default, deserialize_with = "string_or_blocks")]
    pub content: Vec<UserContent>,
}

fn string_or_blocks<'de, D>(deserializer: D) -> Result<Vec<UserContent>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Blocks(Vec<UserContent>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => vec![UserContent::Text { text }],
        Raw::Blocks(blocks) => blocks,
    })
}

/// User-role event data, carrying tool results back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub message: UserMessage,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl UserEvent {
    /// Tool results in this record, in order.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.message.content.iter().filter_map(|content| match content {
            UserContent::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// Result subtype. Unrecognized subtypes are preserved rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultSubtype {
    Success,
    ErrorMaxTurns,
    ErrorDuringExecution,
    ErrorMaxBudgetUsd,
    ErrorMaxStructuredOutputRetries,
    Other(String),
}

impl ResultSubtype {
    /// Returns true for every subtype except `Success`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::ErrorMaxTurns => "error_max_turns",
            Self::ErrorDuringExecution => "error_during_execution",
            Self::ErrorMaxBudgetUsd => "error_max_budget_usd",
            Self::ErrorMaxStructuredOutputRetries => "error_max_structured_output_retries",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for ResultSubtype {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => Self::Success,
            "error_max_turns" => Self::ErrorMaxTurns,
            "error_during_execution" => Self::ErrorDuringExecution,
            "error_max_budget_usd" => Self::ErrorMaxBudgetUsd,
            "error_max_structured_output_retries" => Self::ErrorMaxStructuredOutputRetries,
            _ => Self::Other(value),
        }
    }
}

impl From<ResultSubtype> for String {
    fn from(value: ResultSubtype) -> Self {
        value.as_str().to_string()
    }
}

/// A tool invocation the permission layer refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDenial {
    pub tool_name: String,
    pub tool_use_id: String,
    #[serde(default)]
    pub tool_input: Map<String, Value>,
}

/// Final result event data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEvent {
    /// Result subtype (e.g., "success", "`error_max_turns`").
    pub subtype: ResultSubtype,
    /// Session identifier.
    #[serde(default)]
    pub session_id: String,
    /// Whether an error occurred.
    #[serde(default)]
    pub is_error: bool,
    /// Final response text, present on success.
    #[serde(default)]
    pub result: Option<String>,
    /// Total cost in USD.
    #[serde(default, alias = "cost_usd")]
    pub total_cost_usd: f64,
    /// Total duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// API call duration in milliseconds.
    #[serde(default)]
    pub duration_api_ms: u64,
    /// Number of conversation turns.
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub permission_denials: Vec<PermissionDenial>,
    /// Human-readable error messages for error subtypes.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ResultEvent {
    /// True when the turn finished without a logical error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.subtype.is_error() && !self.is_error
    }
}

/// Events emitted by Claude Code in stream-json format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeEvent {
    /// System event; `Init` establishes the session identity.
    System(SystemEvent),
    /// Assistant turn.
    Assistant(AssistantEvent),
    /// User-role record carrying tool results.
    User(UserEvent),
    /// Final result event.
    Result(ResultEvent),
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

impl ClaudeEvent {
    /// Returns true if this is a terminal event (Result).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns the init payload if this is the session init event.
    #[must_use]
    pub fn as_init(&self) -> Option<&SystemInit> {
        match self {
            Self::System(SystemEvent::Init(init)) => Some(init),
            _ => None,
        }
    }

    /// Returns the session ID if available.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::System(SystemEvent::Init(init)) => Some(&init.session_id),
            Self::Assistant(event) => event.session_id.as_deref(),
            Self::User(event) => event.session_id.as_deref(),
            Self::Result(result) => Some(&result.session_id),
            Self::System(SystemEvent::Other) | Self::Unknown => None,
        }
    }
}
