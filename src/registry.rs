// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds the one [`ToolRegistry`] shared by every front-end (plain CLI,
//! Telegram chat, detached runs): the sub-agent orchestrator backends from
//! [`sven_team::Backends`], plus every builtin tool the bundled system
//! prompt advertises.
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use sven_config::{AgentMode, GdbConfig};
use sven_team::Backends;
use sven_tools::builtin::gdb::state::GdbSessionState;
use sven_tools::builtin::gdb::{
    GdbCommandTool, GdbConnectTool, GdbInterruptTool, GdbStartServerTool, GdbStatusTool, GdbStopTool,
    GdbWaitStoppedTool,
};
use sven_tools::builtin::weather::WeatherTool;
use sven_tools::events::{TodoItem, ToolEvent};
use sven_tools::{
    AskQuestionTool, CursorAgentTool, DelegateTool, DeleteFileTool, EditFileTool, FindFileTool, GrepTool,
    ListDirTool, ListKnowledgeTool, LoadSkillTool, MemorySearchTool, ReadFileTool, ReadImageTool, ReadLintsTool,
    RunTerminalCommandTool, SearchCodebaseTool, SearchKnowledgeTool, SmartDelegateTool, SwitchModeTool,
    TodoWriteTool, ToolRegistry, UpdateMemoryTool, WebFetchTool, WebSearchTool, WriteTool,
};
use sven_runtime::SharedKnowledge;

/// Default per-command timeout for `run_terminal_command`, matching the
/// teacher's own CI/TUI default.
const TERMINAL_TIMEOUT_SECS: u64 = 120;

/// Assemble the registry for one process lifetime. `project_root` (if any)
/// scopes skill and knowledge-base discovery; re-run per invocation since
/// this binary does not keep a long-lived daemon process between requests.
pub fn build_registry(backends: &Backends, project_root: Option<&Path>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // Sub-agent orchestrator, wired to the singleton backends built once at
    // startup from the loaded config.
    registry.register(DelegateTool { backend: backends.delegate.clone() });
    registry.register(SmartDelegateTool { backend: backends.smart_delegate.clone() });
    registry.register(CursorAgentTool { backend: backends.cursor_agent.clone() });
    registry.register(MemorySearchTool { backend: backends.memory_search.clone() });
    registry.register(WeatherTool { backend: backends.weather.clone() });

    // File and codebase tools.
    registry.register(ReadFileTool);
    registry.register(WriteTool);
    registry.register(EditFileTool);
    registry.register(DeleteFileTool);
    registry.register(ListDirTool);
    registry.register(FindFileTool);
    registry.register(GrepTool);
    registry.register(SearchCodebaseTool);
    registry.register(ReadImageTool);
    registry.register(ReadLintsTool);
    registry.register(RunTerminalCommandTool { timeout_secs: TERMINAL_TIMEOUT_SECS });

    // Web tools.
    registry.register(WebFetchTool);
    registry.register(WebSearchTool { api_key: std::env::var("WEB_SEARCH_API_KEY").ok() });

    // Knowledge base, discovered once and handed out as a live-refreshable
    // snapshot (same `Shared<T>` pattern the teacher uses for skills/agents).
    let knowledge = SharedKnowledge::empty();
    knowledge.refresh(project_root);
    registry.register(ListKnowledgeTool { knowledge: knowledge.clone() });
    registry.register(SearchKnowledgeTool { knowledge });

    let skills: Arc<[sven_runtime::SkillInfo]> = sven_runtime::discover_skills(project_root).into();
    registry.register(LoadSkillTool::new(skills));

    // GDB session tools share one session state across the registry.
    let gdb_state = Arc::new(Mutex::new(GdbSessionState::default()));
    let gdb_cfg = GdbConfig::default();
    registry.register(GdbConnectTool::new(gdb_state.clone(), gdb_cfg.clone()));
    registry.register(GdbCommandTool::new(gdb_state.clone(), gdb_cfg.clone()));
    registry.register(GdbStartServerTool::new(gdb_state.clone(), gdb_cfg));
    registry.register(GdbStatusTool::new(gdb_state.clone()));
    registry.register(GdbStopTool::new(gdb_state.clone()));
    registry.register(GdbWaitStoppedTool::new(gdb_state.clone()));
    registry.register(GdbInterruptTool::new(gdb_state));

    // TodoWriteTool/SwitchModeTool report UI-feedback events; this front-end
    // has no interactive consumer, so the receiver is simply dropped and
    // events go nowhere (the tools themselves work fine with a closed
    // channel — sends just become no-ops).
    let (event_tx, _event_rx) = mpsc::channel::<ToolEvent>(16);
    registry.register(TodoWriteTool::new(Arc::new(Mutex::new(Vec::<TodoItem>::new())), event_tx.clone()));
    registry.register(SwitchModeTool::new(Arc::new(Mutex::new(AgentMode::Agent)), event_tx));

    registry.register(UpdateMemoryTool::default());
    // No TUI to route questions through; ask_question always reports back
    // that interactive input isn't available in this front-end.
    registry.register(AskQuestionTool::new_headless());

    registry
}
