//! One-shot prompt helper.

use std::collections::HashSet;

use futures_util::StreamExt;
use serde::Serialize;

use crate::cli::{AssistantMessage, ClaudeEvent, ResultEvent, Usage};
use crate::config::SessionConfig;
use crate::session::{Session, SessionError, StreamOptions};

/// Outcome of a single prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptSummary {
    /// Final result text, or the last assistant text when no result arrived.
    pub result: String,
    pub session_id: Option<String>,
    pub total_cost_usd: f64,
    pub usage: Usage,
    pub num_turns: u32,
    pub duration_ms: u64,
    /// True for error results, missing results, and abnormal exits.
    pub is_error: bool,
    pub errors: Vec<String>,
    pub exit_code: Option<i32>,
}

/// Folds one invocation's events into a [`PromptSummary`].
///
/// Text and the result are taken from the filtered view. Every assistant
/// record counts toward the fallback usage, including thinking-only ones. The CLI repeats a message's usage on each of its
/// per-block records, so usage is counted once per message ID.
#[derive(Debug, Default)]
pub struct SummaryCollector {
    last_text: Option<String>,
    assistant_usage: Usage,
    counted_messages: HashSet<String>,
    result: Option<ResultEvent>,
}

impl SummaryCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: ClaudeEvent) {
        if let ClaudeEvent::Assistant(assistant) = &event {
            self.count_usage(&assistant.message);
        }

        match StreamOptions::filtered().apply(event) {
            Some(ClaudeEvent::Assistant(assistant)) => {
                if let Some(text) = assistant.text() {
                    self.last_text = Some(text);
                }
            }
            Some(ClaudeEvent::Result(result)) => self.result = Some(result),
            _ => {}
        }
    }

    fn count_usage(&mut self, message: &AssistantMessage) {
        if let Some(id) = &message.id {
            if !self.counted_messages.insert(id.clone()) {
                return;
            }
        }
        self.assistant_usage.accumulate(&message.usage);
    }

    /// Build the summary once the stream is exhausted.
    #[must_use]
    pub fn finish(self, session_id: Option<&str>, exit_code: Option<i32>) -> PromptSummary {
        let mut summary = match self.result {
            Some(result) => {
                let usage = if result.usage.total() == 0 {
                    self.assistant_usage
                } else {
                    result.usage
                };
                let is_error = !result.is_success();
                let text = result
                    .result
                    .filter(|text| !text.is_empty())
                    .or(self.last_text)
                    .unwrap_or_default();
                let mut errors = result.errors;
                if is_error && errors.is_empty() {
                    errors.push(format!("Claude reported {}", result.subtype.as_str()));
                }
                PromptSummary {
                    result: text,
                    session_id: session_id
                        .map(str::to_string)
                        .or_else(|| Some(result.session_id).filter(|id| !id.is_empty())),
                    total_cost_usd: result.total_cost_usd,
                    usage,
                    num_turns: result.num_turns,
                    duration_ms: result.duration_ms,
                    is_error,
                    errors,
                    exit_code,
                }
            }
            None => PromptSummary {
                result: self.last_text.unwrap_or_default(),
                session_id: session_id.map(str::to_string),
                usage: self.assistant_usage,
                is_error: true,
                errors: vec!["Claude exited without a result event".to_string()],
                exit_code,
                ..PromptSummary::default()
            },
        };

        if let Some(code) = exit_code.filter(|code| *code != 0) {
            summary.is_error = true;
            summary.errors.push(format!("Claude exited with code {code}"));
        }

        summary
    }
}

/// Run one prompt in a fresh session and summarize the outcome.
///
/// Logical failures (error results, a missing result, a nonzero exit) are
/// reported through [`PromptSummary::is_error`]. The session is always
/// closed before returning.
///
/// # Errors
///
/// Returns `SessionError` if the Claude process cannot be started.
pub async fn prompt(text: &str, config: SessionConfig) -> Result<PromptSummary, SessionError> {
    let mut session = Session::new(config);
    let outcome = run_turn(&mut session, text).await;
    session.close();
    outcome
}

async fn run_turn(session: &mut Session, text: &str) -> Result<PromptSummary, SessionError> {
    session.send(text)?;

    let mut collector = SummaryCollector::new();
    {
        let mut stream = session.stream(StreamOptions::default())?;
        while let Some(event) = stream.next().await {
            collector.observe(event);
        }
    }

    let (exit_code, exit_error) = match session.last_exit_code().await {
        Ok(code) => (code, None),
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine Claude exit code");
            (None, Some(e.to_string()))
        }
    };

    let mut summary = collector.finish(session.session_id(), exit_code);
    if let Some(error) = exit_error {
        summary.is_error = true;
        summary.errors.push(error);
    }
    tracing::debug!(
        is_error = summary.is_error,
        cost_usd = summary.total_cost_usd,
        "Prompt finished"
    );
    Ok(summary)
}
