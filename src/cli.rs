// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sven",
    about = "Orchestration layer around a third-party CLI coding agent",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run one request against the child agent.
    #[arg(short = 'p', long = "prompt", value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Select an orchestration chat session (sanitized to [A-Za-z0-9_-]).
    #[arg(long, value_name = "NAME")]
    pub chat: Option<String>,

    /// Fixed-count context instead of token-budgeted selection.
    #[arg(long, value_name = "N")]
    pub history_limit: Option<usize>,

    /// Named system prompt key from the orchestration config.
    #[arg(long, value_name = "KEY")]
    pub system_prompt: Option<String>,

    /// Model id, forwarded to the child agent verbatim (e.g. "gpt-5",
    /// "claude-opus-4-5"). Not interpreted by the wrapper.
    #[arg(long, short = 'm', value_name = "ID")]
    pub model: Option<String>,

    /// Delete the selected chat session's history and exit.
    #[arg(long)]
    pub clear_history: bool,

    /// Print the selected chat session's history and exit.
    #[arg(long)]
    pub view_history: bool,

    /// Disable history read/write for this request (used by "new"-thread workers).
    #[arg(long)]
    pub fresh: bool,

    /// Start the Telegram chat front-end (long-polling).
    #[arg(long)]
    pub telegram: bool,

    /// Approve a pending Telegram pairing by its 6-character code.
    #[arg(long, value_name = "CODE")]
    pub telegram_approve: Option<String>,

    /// List chats awaiting pairing approval.
    #[arg(long)]
    pub telegram_list_pending: bool,

    /// List already-paired chats.
    #[arg(long)]
    pub telegram_list_paired: bool,

    /// Verbose Telegram update logging.
    #[arg(long)]
    pub telegram_debug: bool,

    /// Add a reach schedule (combine with --reach-time/--reach-cron/--reach-once-at).
    #[arg(long)]
    pub reach_add: bool,

    /// List all reach schedules.
    #[arg(long)]
    pub reach_list: bool,

    /// Remove a reach schedule by id.
    #[arg(long, value_name = "ID")]
    pub reach_remove: Option<String>,

    /// Run one scheduler tick immediately and report what fired.
    #[arg(long)]
    pub reach_fire: bool,

    /// Daily trigger time for --reach-add, as HH:MM in --reach-timezone.
    #[arg(long, value_name = "HH:MM")]
    pub reach_time: Option<String>,

    /// Cron trigger expression for --reach-add (sec min hour dom month dow).
    #[arg(long, value_name = "EXPR")]
    pub reach_cron: Option<String>,

    /// One-shot trigger: fire this many minutes from now.
    #[arg(long, value_name = "N")]
    pub reach_in_minutes: Option<i64>,

    /// One-shot trigger: fire at this exact RFC3339 timestamp.
    #[arg(long, value_name = "RFC3339")]
    pub reach_once_at: Option<String>,

    /// IANA timezone for --reach-time / --reach-cron (default UTC).
    #[arg(long, value_name = "TZ")]
    pub reach_timezone: Option<String>,

    /// Message body for --reach-add.
    #[arg(long, value_name = "TEXT")]
    pub reach_message: Option<String>,

    /// Target chat id for --reach-add, or "all" to broadcast.
    #[arg(long, value_name = "CHAT", default_value = "all")]
    pub reach_channel: String,

    /// Add a scheduled notification (combine with --schedule-time or --schedule-once).
    #[arg(long)]
    pub schedule_add: bool,

    /// List all scheduled notifications.
    #[arg(long)]
    pub schedule_list: bool,

    /// Remove a scheduled notification by id.
    #[arg(long, value_name = "ID")]
    pub schedule_remove: Option<String>,

    /// Daily trigger time for --schedule-add, as HH:MM.
    #[arg(long, value_name = "HH:MM")]
    pub schedule_time: Option<String>,

    /// Message body for --schedule-add.
    #[arg(long, value_name = "TEXT")]
    pub schedule_message: Option<String>,

    /// One-shot trigger for --schedule-add, as an RFC3339 timestamp.
    #[arg(long, value_name = "RFC3339")]
    pub schedule_once: Option<String>,

    /// Target chat id for --schedule-add, or "all" to broadcast.
    #[arg(long, value_name = "CHAT", default_value = "all")]
    pub schedule_user: String,

    /// List every registered tool name and exit.
    #[arg(long)]
    pub list_tools: bool,

    /// List every discovered skill and exit.
    #[arg(long)]
    pub list_skills: bool,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Anything not recognized above — flags and bare tokens alike — is
    /// forwarded to the child agent verbatim and never interpreted here.
    /// Covers the child agent's own surface (`--api-key`, `-H`/`--header`,
    /// `--output-format`, `--workspace`, `--resume`, and anything else it
    /// understands).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "CHILD_AGENT_ARGS")]
    pub passthrough: Vec<String>,
}

impl Cli {
    /// `true` if any orchestration-layer flag was passed, routing the run
    /// through `run_orchestration` instead of the plain prompt path.
    pub fn wants_orchestration(&self) -> bool {
        self.chat.is_some()
            || self.clear_history
            || self.view_history
            || self.telegram
            || self.telegram_approve.is_some()
            || self.telegram_list_pending
            || self.telegram_list_paired
            || self.reach_add
            || self.reach_list
            || self.reach_remove.is_some()
            || self.reach_fire
            || self.schedule_add
            || self.schedule_list
            || self.schedule_remove.is_some()
            || self.list_tools
            || self.list_skills
    }

}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit.
    ShowConfig,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "sven", &mut std::io::stdout());
}
