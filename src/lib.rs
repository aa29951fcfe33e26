//! MazeBot
//!
//! A screen-watching automation engine for the repetitive "Maze Runner"
//! in-game event. Each cycle the engine captures the bound game window,
//! matches a library of reference templates against the frame, resolves
//! the single active maze event through a priority/threshold policy,
//! and answers with a timed synthetic input sequence.
//!
//! The graphical control panel is a separate collaborator: it supplies
//! a [`BotConfig`], consumes the structured log/status channel, and
//! posts start/pause/resume/stop commands to the [`MazeBot`] runner.
//!
//! # Example
//!
//! ```ignore
//! use mazebot::{BotConfig, LogSink, MazeBot};
//!
//! let config = BotConfig::load("config.toml")?;
//! let (sink, logs) = LogSink::channel();
//! let mut bot = MazeBot::new(config).with_sink(sink);
//! bot.start()?;
//! for entry in logs.try_drain() {
//!     println!("{}", entry.format_line());
//! }
//! ```

pub mod action;
pub mod bot;
pub mod capture;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod matcher;
pub mod resolver;
pub mod template;

// Re-export commonly used types
pub use action::{
    ActionExecutor, ActionSequence, ActionStep, CancelToken, ClickTarget, ExecutionContext,
    ExecutionOutcome,
};
pub use bot::{run_cycle, BotCommand, CycleReport, MazeBot, RunState, RunStatus};
pub use capture::{CaptureSource, Frame, FrameSequenceCapture, Region, WindowCapture};
pub use config::{BotConfig, EventConfig, RegionConfig};
pub use error::{BotError, Result};
pub use input::{DispatchedInput, EnigoDriver, InputDriver, RecordingDriver};
pub use logging::{export_entries, LogEntry, LogLevel, LogReceiver, LogSink};
pub use matcher::{match_frame, MatchResult, Rect};
pub use resolver::{resolve, EventDefinition, ResolvedEvent};
pub use template::{Template, TemplateLibrary};
