//! Colored CLI display utilities for streamed session output.
//!
//! This module renders [`ClaudeEvent`]s and prompt summaries to the
//! terminal for the `claude-session` binary.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};

use crate::cli::{AssistantEvent, ClaudeEvent, ContentBlock, ResultEvent, SystemInit, UserEvent};
use crate::session::PromptSummary;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to a maximum length in characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &Map<String, Value>, raw_mode: bool) -> String {
    input
        .iter()
        .map(|(k, v)| {
            let value_str = match v {
                Value::String(s) => truncate(s, 50, raw_mode),
                other => truncate(&other.to_string(), 50, raw_mode),
            };
            format!("{k}={value_str}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render one streamed event.
pub fn print_event(event: &ClaudeEvent, raw_mode: bool) {
    match event {
        ClaudeEvent::System(_) => {
            if let Some(init) = event.as_init() {
                print_session_start(init, raw_mode);
            }
        }
        ClaudeEvent::Assistant(assistant) => print_assistant(assistant, raw_mode),
        ClaudeEvent::User(user) => print_tool_results(user, raw_mode),
        ClaudeEvent::Result(result) => print_result(result, raw_mode),
        ClaudeEvent::Unknown => {}
    }
}

/// Print session start information.
pub fn print_session_start(init: &SystemInit, raw_mode: bool) {
    println!(
        "{} {} model={}, session={}, tools={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        init.model.cyan(),
        truncate(&init.session_id, 20, raw_mode).dimmed(),
        init.tools.len()
    );
    let _ = io::stdout().flush();
}

fn print_assistant(assistant: &AssistantEvent, raw_mode: bool) {
    let nested = assistant.parent_tool_use_id.is_some();
    for block in &assistant.message.content {
        match block {
            ContentBlock::Thinking { thinking, .. } => print_thinking(thinking),
            ContentBlock::Text { text } => {
                if nested {
                    println!("{} {}", "[AGENT]".magenta().bold(), truncate(text, 200, raw_mode));
                } else {
                    print_text(text);
                    println!();
                }
            }
            ContentBlock::ToolUse(tool_use) => {
                print_tool_request(&tool_use.name, &tool_use.input, raw_mode);
            }
            ContentBlock::Unknown => {}
        }
    }
}

fn print_tool_results(user: &UserEvent, raw_mode: bool) {
    for result in user.tool_results() {
        print_tool_result(
            &result.tool_use_id,
            &result.content.text(),
            result.is_error,
            raw_mode,
        );
    }
}

/// Print a tool request.
pub fn print_tool_request(name: &str, input: &Map<String, Value>, raw_mode: bool) {
    println!(
        "{} {} ({})",
        "[TOOL]".cyan().bold(),
        name.bold(),
        format_tool_input(input, raw_mode).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print thinking content (dimmed).
pub fn print_thinking(text: &str) {
    println!("{}", text.dimmed());
    let _ = io::stdout().flush();
}

/// Print text content.
pub fn print_text(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

/// Print tool result output.
pub fn print_tool_result(tool_use_id: &str, content: &str, is_error: bool, raw_mode: bool) {
    let id_short = truncate(tool_use_id, 12, raw_mode);
    let content_short = truncate(content, 150, raw_mode);
    if is_error {
        println!(
            "{} {} {}",
            "[RESULT]".red().bold(),
            id_short.dimmed(),
            content_short
        );
    } else {
        println!(
            "{} {} {}",
            "[RESULT]".green().bold(),
            id_short.dimmed(),
            content_short
        );
    }
    let _ = io::stdout().flush();
}

/// Print the terminal result of a turn.
pub fn print_result(result: &ResultEvent, raw_mode: bool) {
    let ts = timestamp();
    if result.is_success() {
        println!(
            "{} {} Turn completed (cost: ${:.4}, turns: {}, {}ms) {}",
            ts.dimmed(),
            "[SESSION]".blue().bold(),
            result.total_cost_usd,
            result.num_turns,
            result.duration_ms,
            format!("session_id={}", truncate(&result.session_id, 20, raw_mode)).dimmed()
        );
    } else {
        println!(
            "{} {} Turn ended with {} {}",
            ts.dimmed(),
            "[SESSION]".red().bold(),
            result.subtype.as_str().red(),
            format!("session_id={}", truncate(&result.session_id, 20, raw_mode)).dimmed()
        );
        for error in &result.errors {
            print_error(&truncate(error, 200, raw_mode));
        }
    }
    let _ = io::stdout().flush();
}

/// Print a one-shot prompt summary.
pub fn print_summary(summary: &PromptSummary, raw_mode: bool) {
    if !summary.result.is_empty() {
        println!("{}", summary.result);
    }
    let label = if summary.is_error {
        "[SESSION]".red().bold().to_string()
    } else {
        "[SESSION]".blue().bold().to_string()
    };
    println!(
        "{} {} cost=${:.4} tokens={} {}",
        timestamp().dimmed(),
        label,
        summary.total_cost_usd,
        summary.usage.total(),
        summary
            .session_id
            .as_deref()
            .map_or(String::new(), |id| format!(
                "session_id={}",
                truncate(id, 20, raw_mode)
            ))
            .dimmed()
    );
    for error in &summary.errors {
        print_error(error);
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}
