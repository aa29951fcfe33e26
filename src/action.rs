//! Timed action sequences
//!
//! Translates a resolved event into synthetic input. Sequences are
//! cancellable between steps and inside waits; an input action already
//! handed to the OS cannot be recalled, only the remainder is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::Region;
use crate::error::Result;
use crate::input::InputDriver;

/// Granularity at which waits observe cancellation
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Where a click lands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum ClickTarget {
    /// Center of the template match that resolved the event
    #[default]
    MatchCenter,
    /// Fractional position within the bound window
    Window { fx: f32, fy: f32 },
    /// Absolute screen coordinates
    Screen { x: i32, y: i32 },
}

/// One step of an event's response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionStep {
    /// Click somewhere
    Click {
        #[serde(default)]
        target: ClickTarget,
    },
    /// Tap a named key
    Key { key: String },
    /// Sleep; scaled by the timing multiplier
    Wait { ms: u64 },
}

/// Ordered steps owned by an event definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSequence {
    pub steps: Vec<ActionStep>,
}

impl From<Vec<ActionStep>> for ActionSequence {
    fn from(steps: Vec<ActionStep>) -> Self {
        Self { steps }
    }
}

impl ActionSequence {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// How an execution attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every step ran
    Completed,
    /// Cancelled before the sequence finished
    Interrupted,
    /// A step failed to dispatch; the rest of the sequence was skipped
    Failed { step: usize, reason: String },
}

/// Geometry the executor needs to place clicks
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    /// Bound window geometry at capture time
    pub window: Region,
    /// Screen coordinates of the resolved match center, if any
    pub anchor: Option<(i32, i32)>,
}

/// Cooperative cancellation flag shared between contexts
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm for a fresh run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs action sequences against an input driver
pub struct ActionExecutor<D: InputDriver> {
    driver: D,
    timing_multiplier: f32,
}

impl<D: InputDriver> ActionExecutor<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            timing_multiplier: 1.0,
        }
    }

    /// Scale every wait; low-power mode passes 1.5
    pub fn with_timing_multiplier(mut self, multiplier: f32) -> Self {
        self.set_timing_multiplier(multiplier);
        self
    }

    pub fn set_timing_multiplier(&mut self, multiplier: f32) {
        self.timing_multiplier = multiplier.max(0.0);
    }

    /// Run a sequence to completion, cancellation, or first failure.
    ///
    /// Cancellation is observed before every step and inside waits at
    /// [`WAIT_SLICE`] granularity.
    pub fn execute(
        &mut self,
        sequence: &ActionSequence,
        context: &ExecutionContext,
        cancel: &CancelToken,
    ) -> ExecutionOutcome {
        for (index, step) in sequence.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return ExecutionOutcome::Interrupted;
            }

            let result = match step {
                ActionStep::Click { target } => self.dispatch_click(target, context),
                ActionStep::Key { key } => self.driver.key_tap(key),
                ActionStep::Wait { ms } => {
                    if !self.wait(*ms, cancel) {
                        return ExecutionOutcome::Interrupted;
                    }
                    Ok(())
                }
            };

            if let Err(e) = result {
                log::warn!("action step {index} failed: {e}");
                return ExecutionOutcome::Failed {
                    step: index,
                    reason: e.to_string(),
                };
            }
        }
        ExecutionOutcome::Completed
    }

    fn dispatch_click(&mut self, target: &ClickTarget, context: &ExecutionContext) -> Result<()> {
        let (x, y) = match target {
            ClickTarget::MatchCenter => context.anchor.ok_or_else(|| {
                crate::error::BotError::ActionDispatch(
                    "click targets the match center but no template anchored this event".into(),
                )
            })?,
            ClickTarget::Window { fx, fy } => context.window.to_screen(*fx, *fy),
            ClickTarget::Screen { x, y } => (*x, *y),
        };
        self.driver.click(x, y)
    }

    /// Sleep in slices so a cancel lands promptly; false when cancelled
    fn wait(&self, ms: u64, cancel: &CancelToken) -> bool {
        let total = Duration::from_millis((ms as f32 * self.timing_multiplier) as u64);
        let mut slept = Duration::ZERO;
        while slept < total {
            if cancel.is_cancelled() {
                return false;
            }
            let slice = WAIT_SLICE.min(total - slept);
            std::thread::sleep(slice);
            slept += slice;
        }
        !cancel.is_cancelled()
    }

    /// Access the driver, e.g. to read a recording driver in tests
    pub fn driver(&self) -> &D {
        &self.driver
    }
}
