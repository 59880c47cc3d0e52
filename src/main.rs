// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod registry;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use sven_channels::{pairing, routing::run_main_stream, ChatContext};
use sven_config::EnhancedConfig;
use sven_scheduler::{NotificationEntry, NotificationScheduleType, NullSender, ReachSchedule};
use sven_team::detached::DetachedRunner;
use sven_tools::ToolRegistry;

const DEFAULT_SESSION: &str = "default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprint!("{e}");
            std::process::exit(1);
        }
    };

    init_logging(cli.verbose);

    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = sven_config::load_enhanced_config(cli.config.as_deref());
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
        }
    }

    if cli.wants_orchestration() {
        return run_orchestration(cli).await;
    }

    run_plain_request(cli).await
}

/// The plain `-p <prompt>` path: the CLI is itself one of the chat
/// front-end's consumers, running exactly the same context-assembly /
/// child-agent / tool-dispatch / history-persist sequence as the chat
/// transports, just against a locally named session instead of a chat id.
async fn run_plain_request(cli: Cli) -> anyhow::Result<()> {
    let Some(prompt) = cli.prompt.clone() else {
        eprintln!("error: no prompt given. Pass -p <prompt>, or an orchestration flag (see --help).");
        std::process::exit(1);
    };

    let config = sven_config::load_enhanced_config(cli.config.as_deref());
    let binary = sven_config::resolve_child_agent_path(&config);
    let project_root = sven_runtime::find_project_root().ok();
    let backends = sven_team::build_backends(&config);
    let registry = Arc::new(registry::build_registry(&backends, project_root.as_deref()));
    let max_tokens = sven_memory::pipeline::default_max_tokens();

    let detached = Arc::new(DetachedRunner::new(binary.clone(), config.delegate.timeout_secs, None));
    let ctx = ChatContext {
        config: config.clone(),
        binary: binary.clone(),
        registry,
        detached,
        tracker: backends.tracker.clone(),
        max_tokens: cli.history_limit.map(|n| n as i64).unwrap_or(max_tokens),
        extra_args: child_agent_extra_args(&cli),
        system_prompt: resolve_system_prompt(&config, &cli),
    };

    if cli.fresh {
        let response = run_fresh_prompt(&ctx, &prompt).await?;
        println!("{response}");
        return Ok(());
    }

    let session = cli.chat.clone().unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let response = run_main_stream(&ctx, &session, &prompt).await;
    println!("{response}");
    Ok(())
}

/// `--fresh`: no history read/write, used for one-shot requests that should
/// not pollute any session (mirrors the chat front-end's "new"-thread workers).
async fn run_fresh_prompt(ctx: &ChatContext, prompt: &str) -> anyhow::Result<String> {
    let Some(binary) = ctx.binary.clone() else {
        anyhow::bail!("no child agent binary configured (set CURSOR_AGENT_PATH, or install cursor-agent)");
    };
    let timeout = Duration::from_secs(ctx.config.delegate.timeout_secs);
    let full_prompt = match &ctx.system_prompt {
        Some(system) => format!("System: {system}\nUser: {prompt}\n"),
        None => prompt.to_string(),
    };
    let mut args = vec!["--print".to_string(), full_prompt];
    args.extend(ctx.extra_args.iter().cloned());
    let out = sven_config::invoke_child_agent(&binary, &args, &Default::default(), timeout).await?;
    if out.success() {
        let (augmented, _outputs) = sven_tools::dispatch(&out.stdout, ctx.registry.as_ref(), Some(prompt)).await;
        Ok(augmented)
    } else if out.timed_out {
        Ok(format!("Agent timed out after {}s.", ctx.config.delegate.timeout_secs))
    } else {
        std::process::exit(out.exit_code.unwrap_or(1));
    }
}

/// Everything that bypasses the plain request path: session bookkeeping,
/// Telegram, the reach/notification scheduler, and tool/skill introspection.
async fn run_orchestration(cli: Cli) -> anyhow::Result<()> {
    let config = sven_config::load_enhanced_config(cli.config.as_deref());
    let binary = sven_config::resolve_child_agent_path(&config);
    let project_root = sven_runtime::find_project_root().ok();

    if cli.clear_history {
        return clear_history(&cli);
    }
    if cli.view_history {
        return view_history(&cli);
    }
    if cli.list_tools {
        let backends = sven_team::build_backends(&config);
        let registry = registry::build_registry(&backends, project_root.as_deref());
        return list_tools(&registry);
    }
    if cli.list_skills {
        return list_skills(project_root.as_deref());
    }

    if cli.telegram_approve.is_some() || cli.telegram_list_pending || cli.telegram_list_paired {
        return handle_pairing(&cli);
    }

    if cli.reach_add || cli.reach_list || cli.reach_remove.is_some() || cli.reach_fire {
        return handle_reach(&cli).await;
    }

    if cli.schedule_add || cli.schedule_list || cli.schedule_remove.is_some() {
        return handle_schedule(&cli);
    }

    if cli.telegram {
        return run_telegram(cli, config, binary, project_root).await;
    }

    // `--chat <name>` with no other orchestration flag: a plain request
    // against a named session, same flow as the default prompt path.
    if let Some(prompt) = cli.prompt.clone() {
        let backends = sven_team::build_backends(&config);
        let registry = Arc::new(registry::build_registry(&backends, project_root.as_deref()));
        let max_tokens = sven_memory::pipeline::default_max_tokens();
        let detached = Arc::new(DetachedRunner::new(binary.clone(), config.delegate.timeout_secs, None));
        let ctx = ChatContext {
            config: config.clone(),
            binary,
            registry,
            detached,
            tracker: backends.tracker.clone(),
            max_tokens: cli.history_limit.map(|n| n as i64).unwrap_or(max_tokens),
            extra_args: child_agent_extra_args(&cli),
            system_prompt: resolve_system_prompt(&config, &cli),
        };
        let session = cli.chat.clone().unwrap_or_else(|| DEFAULT_SESSION.to_string());
        let response = run_main_stream(&ctx, &session, &prompt).await;
        println!("{response}");
        return Ok(());
    }

    eprintln!("error: --chat requires -p <prompt> (or combine with --clear-history/--view-history).");
    std::process::exit(1);
}

/// `--model <id>` plus any unrecognized trailing flags/positionals are
/// forwarded to the child agent verbatim; the wrapper never interprets
/// either, per spec.md's "forward unknown surface" requirement.
fn child_agent_extra_args(cli: &Cli) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(model) = &cli.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    args.extend(cli.passthrough.iter().cloned());
    args
}

/// Resolve `--system-prompt <key>` against the configured personas.
fn resolve_system_prompt(config: &EnhancedConfig, cli: &Cli) -> Option<String> {
    let key = cli.system_prompt.as_deref()?;
    match config.agent_personas.iter().find(|p| p.id == key) {
        Some(persona) => Some(persona.system_prompt.clone()),
        None => {
            tracing::warn!(key, "no agent persona configured with this id, ignoring --system-prompt");
            None
        }
    }
}

fn session_paths(cli: &Cli) -> (std::path::PathBuf, std::path::PathBuf) {
    let session = cli.chat.clone().unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let session = sven_memory::sanitize_session_name(&session);
    let base_dir = sven_memory::paths::home_dir();
    (
        sven_memory::history::history_path(&base_dir, &session),
        sven_memory::history::history_meta_path(&base_dir, &session),
    )
}

fn clear_history(cli: &Cli) -> anyhow::Result<()> {
    let (history_path, meta_path) = session_paths(cli);
    for path in [&history_path, &meta_path] {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    println!("Cleared history for session '{}'.", cli.chat.as_deref().unwrap_or(DEFAULT_SESSION));
    Ok(())
}

fn view_history(cli: &Cli) -> anyhow::Result<()> {
    let (history_path, _meta_path) = session_paths(cli);
    let history = sven_memory::history::load_history(&history_path);
    if history.is_empty() {
        println!("No history for session '{}'.", cli.chat.as_deref().unwrap_or(DEFAULT_SESSION));
        return Ok(());
    }
    for entry in &history {
        println!("## {}\n{}\n", entry.role, entry.content);
    }
    Ok(())
}

fn list_tools(registry: &ToolRegistry) -> anyhow::Result<()> {
    let mut names = registry.names();
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn list_skills(project_root: Option<&Path>) -> anyhow::Result<()> {
    let skills = sven_runtime::discover_skills(project_root);
    if skills.is_empty() {
        println!("No skills discovered.");
        return Ok(());
    }
    for skill in &skills {
        println!("{:<30} {}", skill.command, skill.description);
    }
    Ok(())
}

fn handle_pairing(cli: &Cli) -> anyhow::Result<()> {
    if let Some(code) = &cli.telegram_approve {
        let mut state = pairing::load();
        match state.approve(code) {
            Some(chat_id) => {
                pairing::save(&state)?;
                println!("Approved chat {chat_id}.");
            }
            None => println!("No pending pairing with code '{code}'."),
        }
        return Ok(());
    }

    let state = pairing::load();
    if cli.telegram_list_pending {
        if state.pending_pairings.is_empty() {
            println!("No chats awaiting pairing approval.");
        } else {
            for (code, chat_id) in &state.pending_pairings {
                println!("{code}  chat={chat_id}");
            }
        }
    }
    if cli.telegram_list_paired {
        if state.paired_users.is_empty() {
            println!("No paired chats.");
        } else {
            let mut ids: Vec<_> = state.paired_users.iter().collect();
            ids.sort();
            for id in ids {
                println!("{id}");
            }
        }
    }
    Ok(())
}

async fn run_telegram(
    cli: Cli,
    config: EnhancedConfig,
    binary: Option<std::path::PathBuf>,
    project_root: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let token = config
        .telegram
        .bot_token
        .clone()
        .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
        .ok_or_else(|| anyhow::anyhow!("no Telegram bot token configured (set TELEGRAM_BOT_TOKEN)"))?;

    std::env::set_var("CURSOR_ENHANCED_CHANNEL", "telegram");
    if cli.telegram_debug {
        tracing::info!("telegram debug logging enabled");
    }

    let backends = sven_team::build_backends(&config);
    let registry = Arc::new(registry::build_registry(&backends, project_root.as_deref()));
    let max_tokens = sven_memory::pipeline::default_max_tokens();

    // Detached-run completion notifications go out through their own `Bot`
    // instance rather than the one `telegram::run` owns internally below;
    // both are cheap stateless HTTP clients built from the same token.
    let notifier: Arc<dyn sven_team::detached::ChatNotifier> =
        Arc::new(sven_channels::telegram::TelegramNotifier::new(token.clone()));
    let detached = Arc::new(DetachedRunner::new(binary.clone(), config.delegate.timeout_secs, Some(notifier)));

    let ctx = Arc::new(ChatContext {
        config: config.clone(),
        binary,
        registry,
        detached,
        tracker: backends.tracker.clone(),
        max_tokens,
        extra_args: Vec::new(),
        system_prompt: None,
    });

    // The scheduler tick runs alongside the Telegram long-poll loop so reach
    // schedules and notifications keep firing while the bot is up.
    let scheduler_sender: Arc<dyn sven_scheduler::ChatSender> =
        Arc::new(sven_channels::telegram::TelegramChatSender::new(token.clone()));
    tokio::spawn(sven_scheduler::run_forever(
        scheduler_sender,
        Duration::from_secs(config.scheduler_interval_secs),
    ));

    sven_channels::telegram::run(token, ctx).await;
    Ok(())
}

async fn handle_reach(cli: &Cli) -> anyhow::Result<()> {
    if cli.reach_add {
        let message = cli
            .reach_message
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--reach-add requires --reach-message"))?;
        let channel = cli.reach_channel.clone();

        let schedule = if let Some(time) = &cli.reach_time {
            ReachSchedule::daily(time.clone(), cli.reach_timezone.clone(), message, channel)?
        } else if let Some(expr) = &cli.reach_cron {
            ReachSchedule::cron(expr.clone(), cli.reach_timezone.clone(), message, channel)?
        } else if let Some(at) = &cli.reach_once_at {
            ReachSchedule::once_at(at.clone(), message, channel)
        } else if let Some(minutes) = cli.reach_in_minutes {
            let at = (Utc::now() + chrono::Duration::minutes(minutes)).to_rfc3339();
            ReachSchedule::once_at(at, message, channel)
        } else {
            anyhow::bail!(
                "--reach-add requires one of --reach-time, --reach-cron, --reach-once-at, --reach-in-minutes"
            );
        };

        let mut store = sven_scheduler::store::load_reach_schedules();
        let id = schedule.id;
        store.schedules.push(schedule);
        sven_scheduler::store::save_reach_schedules(&store)?;
        println!("Added reach schedule {id}.");
        return Ok(());
    }

    if cli.reach_list {
        let store = sven_scheduler::store::load_reach_schedules();
        if store.schedules.is_empty() {
            println!("No reach schedules.");
        }
        for s in &store.schedules {
            let trigger = s.time.as_deref().or(s.cron.as_deref()).or(s.once_at.as_deref()).unwrap_or("?");
            println!("{}  channel={}  enabled={}  trigger={}  {}", s.id, s.channel, s.enabled, trigger, s.message);
        }
        return Ok(());
    }

    if let Some(id) = &cli.reach_remove {
        let mut store = sven_scheduler::store::load_reach_schedules();
        let before = store.schedules.len();
        store.schedules.retain(|s| s.id.to_string() != *id);
        sven_scheduler::store::save_reach_schedules(&store)?;
        if store.schedules.len() == before {
            println!("No reach schedule with id '{id}'.");
        } else {
            println!("Removed reach schedule {id}.");
        }
        return Ok(());
    }

    if cli.reach_fire {
        let report = sven_scheduler::run_once(&NullSender, Utc::now()).await;
        println!("Reach schedules fired: {}", report.reach_fired.len());
        for id in &report.reach_fired {
            println!("  {id}");
        }
        println!("Notifications fired: {}", report.notifications_fired.len());
        for id in &report.notifications_fired {
            println!("  {id}");
        }
    }

    Ok(())
}

fn handle_schedule(cli: &Cli) -> anyhow::Result<()> {
    if cli.schedule_add {
        let message = cli
            .schedule_message
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--schedule-add requires --schedule-message"))?;
        let target = cli.schedule_user.clone();

        let (schedule_type, time, once_at, next_run) = if let Some(time) = &cli.schedule_time {
            let tz = sven_scheduler::parse_timezone(None)?;
            let next = sven_scheduler::next_daily_occurrence(time, tz, Utc::now())?;
            (NotificationScheduleType::Daily, Some(time.clone()), None, Some(next))
        } else if let Some(once) = &cli.schedule_once {
            (NotificationScheduleType::Once, None, Some(once.clone()), Some(once.clone()))
        } else {
            anyhow::bail!("--schedule-add requires --schedule-time or --schedule-once");
        };

        let entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type,
            message,
            target,
            enabled: true,
            time,
            once_at,
            last_run: None,
            next_run,
            timezone: None,
        };

        let mut store = sven_scheduler::store::load_notifications();
        let id = entry.id;
        store.notifications.push(entry);
        sven_scheduler::store::save_notifications(&store)?;
        println!("Added scheduled notification {id}.");
        return Ok(());
    }

    if cli.schedule_list {
        let store = sven_scheduler::store::load_notifications();
        if store.notifications.is_empty() {
            println!("No scheduled notifications.");
        }
        for n in &store.notifications {
            println!(
                "{}  target={}  type={:?}  next_run={}  {}",
                n.id,
                n.target,
                n.schedule_type,
                n.next_run.as_deref().unwrap_or("-"),
                n.message
            );
        }
        return Ok(());
    }

    if let Some(id) = &cli.schedule_remove {
        let mut store = sven_scheduler::store::load_notifications();
        let before = store.notifications.len();
        store.notifications.retain(|n| n.id.to_string() != *id);
        sven_scheduler::store::save_notifications(&store)?;
        if store.notifications.len() == before {
            println!("No scheduled notification with id '{id}'.");
        } else {
            println!("Removed scheduled notification {id}.");
        }
        return Ok(());
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
