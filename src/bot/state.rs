//! Run state for the bot loop

use serde::{Deserialize, Serialize};

use super::command::BotCommand;

/// Lifecycle status of the bot loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No loop alive; the only state where reconfiguration is unrestricted
    #[default]
    Idle,
    /// Cycles are being driven
    Running,
    /// Loop alive but capture/match/act suspended
    Paused,
}

impl RunStatus {
    /// Apply a command to the state machine.
    ///
    /// Invalid transitions leave the status unchanged, so no command
    /// sequence can reach a state outside {Idle, Running, Paused}.
    pub fn apply(self, command: BotCommand) -> RunStatus {
        match (self, command) {
            (RunStatus::Idle, BotCommand::Start) => RunStatus::Running,
            (RunStatus::Running, BotCommand::Pause) => RunStatus::Paused,
            (RunStatus::Paused, BotCommand::Resume) => RunStatus::Running,
            (RunStatus::Running | RunStatus::Paused, BotCommand::Stop) => RunStatus::Idle,
            (status, _) => status,
        }
    }

    pub fn is_idle(self) -> bool {
        self == RunStatus::Idle
    }
}

/// Externally visible snapshot of the loop.
///
/// Written only by the loop thread; the UI thread reads clones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunState {
    pub status: RunStatus,
    /// Title substring of the currently bound window, if bound
    pub window_title: Option<String>,
    /// Cycles completed this run
    pub cycle: u64,
    /// Name of the most recently resolved event
    pub last_event: Option<String>,
    /// Most recent error, surfaced prominently for the UI
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-run counters, keeping the window binding
    pub fn begin_run(&mut self) {
        self.status = RunStatus::Running;
        self.cycle = 0;
        self.last_event = None;
        self.last_error = None;
    }
}
