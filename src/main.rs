//! Claude Session - run prompts and multi-turn chats against Claude Code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_session::config::{ConfigLoader, SessionConfig};
use claude_session::display;
use claude_session::session::{prompt, Session, SessionError, StreamOptions};

/// Grace period before a SIGTERM'd invocation is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(
    name = "claude-session",
    about = "Multi-turn sessions over the Claude Code CLI",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to load instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct Overrides {
    /// Model to use.
    #[arg(long)]
    model: Option<String>,
    /// Working directory for Claude Code.
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Path to the Claude Code executable.
    #[arg(long)]
    claude: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single prompt and print its summary.
    Prompt {
        /// The prompt text.
        text: String,
        #[command(flatten)]
        overrides: Overrides,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
        /// Kill Claude if the prompt takes longer than this.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Chat interactively, one prompt per line of stdin.
    Chat {
        /// Session ID to resume.
        #[arg(long)]
        resume: Option<String>,
        #[command(flatten)]
        overrides: Overrides,
        /// Show init, thinking, and tool-result events too.
        #[arg(long)]
        all_events: bool,
        /// Do not truncate long values.
        #[arg(long)]
        raw: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn apply_overrides(mut config: SessionConfig, overrides: Overrides, verbose: bool) -> SessionConfig {
    if let Some(model) = overrides.model {
        config = config.model(model);
    }
    if let Some(cwd) = overrides.cwd {
        config = config.working_dir(cwd);
    }
    if let Some(claude) = overrides.claude {
        config = config.executable(claude);
    }
    config.verbose = config.verbose || verbose;
    config
}

async fn run_prompt(
    text: &str,
    config: SessionConfig,
    json: bool,
    timeout: Option<Duration>,
) -> ExitCode {
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, prompt(text, config)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                display::print_error(&format!("Prompt timed out after {}s", limit.as_secs()));
                return ExitCode::FAILURE;
            }
        },
        None => prompt(text, config).await,
    };

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(body) => println!("{body}"),
            Err(e) => {
                display::print_error(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    } else {
        display::print_summary(&summary, false);
    }

    if summary.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn drain(
    session: &mut Session,
    options: StreamOptions,
    raw: bool,
) -> Result<(), SessionError> {
    let mut events = session.stream(options)?;
    while let Some(event) = events.next().await {
        display::print_event(&event, raw);
    }
    Ok(())
}

async fn run_chat(mut session: Session, options: StreamOptions, raw: bool) -> ExitCode {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut code = ExitCode::SUCCESS;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                display::print_error(&format!("Failed to read stdin: {e}"));
                code = ExitCode::FAILURE;
                break;
            }
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/exit" {
            break;
        }

        if let Err(e) = session.send(text) {
            display::print_error(&e.to_string());
            code = ExitCode::FAILURE;
            break;
        }

        let interrupted = tokio::select! {
            drained = drain(&mut session, options, raw) => match drained {
                Ok(()) => false,
                Err(e) => {
                    display::print_error(&e.to_string());
                    true
                }
            },
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted {
            if let Err(e) = session.shutdown(SHUTDOWN_GRACE).await {
                tracing::warn!(error = %e, "Shutdown did not complete cleanly");
            }
            code = ExitCode::FAILURE;
            break;
        }

        match session.last_exit_code().await {
            Ok(Some(0) | None) => {}
            Ok(Some(exit)) => {
                display::print_error(&format!("Claude exited with code {exit}"));
            }
            Err(e) => display::print_error(&e.to_string()),
        }
    }

    session.close();
    if let Some(id) = session.session_id() {
        println!("Resume with: claude-session chat --resume {id}");
    }
    code
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Prompt {
            text,
            overrides,
            json,
            timeout_secs,
        } => {
            let config = apply_overrides(config, overrides, verbose);
            tracing::info!(model = config.effective_model(), "Running prompt");
            run_prompt(&text, config, json, timeout_secs.map(Duration::from_secs)).await
        }
        Commands::Chat {
            resume,
            overrides,
            all_events,
            raw,
        } => {
            let config = apply_overrides(config, overrides, verbose);
            let session = match resume {
                Some(id) => Session::resume(id, config),
                None => Session::new(config),
            };
            let options = if all_events {
                StreamOptions::default()
            } else {
                StreamOptions::filtered()
            };
            run_chat(session, options, raw).await
        }
    }
}
