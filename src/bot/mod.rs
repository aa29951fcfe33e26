//! Bot loop and lifecycle
//!
//! This module contains the scheduler around the vision/action
//! pipeline:
//! - `RunStatus`/`RunState` - the single-writer state machine
//! - `BotCommand`/`CommandDebouncer` - debounced UI command requests
//! - `MazeBot` - the runner owning the worker thread
//! - `run_cycle` - one synchronously testable cycle

mod command;
mod runner;
mod state;

pub use command::{BotCommand, CommandDebouncer, DEBOUNCE_WINDOW};
pub use runner::{run_cycle, CaptureFactory, CycleReport, DriverFactory, MazeBot};
pub use state::{RunState, RunStatus};
