//! Bot loop runner
//!
//! Owns the run/pause/stop lifecycle and drives
//! capture→match→resolve→act cycles on a dedicated worker thread. The
//! UI context only reads [`RunState`] snapshots and posts debounced
//! command requests; the worker is the single writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::action::{ActionExecutor, CancelToken, ExecutionContext, ExecutionOutcome};
use crate::capture::{CaptureSource, WindowCapture};
use crate::config::BotConfig;
use crate::error::{BotError, Result};
use crate::input::{EnigoDriver, InputDriver};
use crate::logging::{LogEntry, LogLevel, LogSink};
use crate::matcher::match_frame;
use crate::resolver::{resolve, EventDefinition};
use crate::template::TemplateLibrary;

use super::command::{BotCommand, CommandDebouncer};
use super::state::{RunState, RunStatus};

/// Sleep slice while parked in Paused
const PAUSE_POLL: Duration = Duration::from_millis(50);
/// Granularity of the cancellable inter-cycle sleep
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Builds the capture source for a run; swapped out in tests
pub type CaptureFactory =
    Arc<dyn Fn(&BotConfig) -> Result<Box<dyn CaptureSource>> + Send + Sync>;

/// Builds the input driver inside the worker thread
pub type DriverFactory = Arc<dyn Fn() -> Result<Box<dyn InputDriver>> + Send + Sync>;

/// Everything one run reads; immutable to the loop between swaps
struct RunBundle {
    config: BotConfig,
    library: TemplateLibrary,
    events: Vec<EventDefinition>,
}

impl RunBundle {
    /// Load and cross-check all run inputs. Errors here are fatal and
    /// block starting (or staging) a run.
    fn build(config: BotConfig) -> Result<Self> {
        config.validate()?;
        let library = TemplateLibrary::load(&config.templates_dir, &config)?;
        let events = config.event_definitions()?;
        config.validate_template_refs(&events, &library)?;
        Ok(Self {
            config,
            library,
            events,
        })
    }
}

struct Shared {
    /// Loop liveness; cleared by stop and by loop exit
    running: AtomicBool,
    /// Suspends cycles without killing the loop
    pause_requested: AtomicBool,
    /// Aborts an in-flight action sequence
    cancel: CancelToken,
    state: Mutex<RunState>,
    /// Configuration staged for the next cycle boundary
    staged: Mutex<Option<RunBundle>>,
}

/// The bot engine handle held by the UI context
pub struct MazeBot {
    config: BotConfig,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    debouncer: CommandDebouncer,
    sink: LogSink,
    capture_factory: CaptureFactory,
    driver_factory: DriverFactory,
}

impl MazeBot {
    /// Create a bot over the real window capture and input backend
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                pause_requested: AtomicBool::new(false),
                cancel: CancelToken::new(),
                state: Mutex::new(RunState::new()),
                staged: Mutex::new(None),
            }),
            worker: None,
            debouncer: CommandDebouncer::default(),
            sink: LogSink::disconnected(),
            capture_factory: Arc::new(|config: &BotConfig| {
                let capture = WindowCapture::bind(config.window_title.clone())?;
                Ok(Box::new(capture) as Box<dyn CaptureSource>)
            }),
            driver_factory: Arc::new(|| {
                let driver = EnigoDriver::new()?;
                Ok(Box::new(driver) as Box<dyn InputDriver>)
            }),
        }
    }

    /// Attach the status channel sink
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the capture source, e.g. with a frame sequence
    pub fn with_capture_factory(mut self, factory: CaptureFactory) -> Self {
        self.capture_factory = factory;
        self
    }

    /// Replace the input backend, e.g. with a recording driver
    pub fn with_driver_factory(mut self, factory: DriverFactory) -> Self {
        self.driver_factory = factory;
        self
    }

    /// Override the command debounce window
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debouncer = CommandDebouncer::new(window);
        self
    }

    /// Snapshot of the externally visible run state
    pub fn state(&self) -> RunState {
        self.shared.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Route a lifecycle command
    pub fn handle_command(&mut self, command: BotCommand) -> Result<()> {
        match command {
            BotCommand::Start => self.start(),
            BotCommand::Pause => self.pause(),
            BotCommand::Resume => self.resume(),
            BotCommand::Stop => self.stop(),
        }
    }

    /// Start a run.
    ///
    /// Loads templates and the event table; load errors block the start.
    /// Window binding happens inside the loop so a missing window pauses
    /// the run instead of failing it.
    pub fn start(&mut self) -> Result<()> {
        if !self.debouncer.accept(BotCommand::Start) {
            return Ok(());
        }
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(BotError::AlreadyRunning);
        }
        // A previous run's worker may still need reaping
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let bundle = RunBundle::build(self.config.clone())?;
        self.sink.info(format!(
            "starting: {} templates, {} events",
            bundle.library.len(),
            bundle.events.len()
        ));

        self.shared.cancel.reset();
        self.shared.pause_requested.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        // The worker is not alive yet, so this write cannot race it
        self.shared.state.lock().begin_run();

        let shared = self.shared.clone();
        let sink = self.sink.clone().with_verbose(bundle.config.debug);
        let capture_factory = self.capture_factory.clone();
        let driver_factory = self.driver_factory.clone();

        let handle = thread::Builder::new()
            .name("mazebot-loop".to_string())
            .spawn(move || {
                run_bot_loop(shared, bundle, capture_factory, driver_factory, sink);
            })
            .map_err(|e| BotError::Thread(e.to_string()))?;
        self.worker = Some(handle);

        log::info!("Bot started");
        Ok(())
    }

    /// Suspend cycles; the loop stays alive and resumable.
    ///
    /// An in-flight action sequence stops at its next suspension point;
    /// the skipped remainder is not replayed on resume.
    pub fn pause(&mut self) -> Result<()> {
        if !self.debouncer.accept(BotCommand::Pause) {
            return Ok(());
        }
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.pause_requested.store(true, Ordering::SeqCst);
            self.shared.cancel.cancel();
        }
        Ok(())
    }

    /// Resume from pause without re-binding the window
    pub fn resume(&mut self) -> Result<()> {
        if !self.debouncer.accept(BotCommand::Resume) {
            return Ok(());
        }
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.pause_requested.store(false, Ordering::SeqCst);
            self.shared.cancel.reset();
        }
        Ok(())
    }

    /// Stop the run, cancelling any in-flight action sequence
    pub fn stop(&mut self) -> Result<()> {
        if !self.debouncer.accept(BotCommand::Stop) {
            return Ok(());
        }
        self.shared.cancel.cancel();
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.pause_requested.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            handle
                .join()
                .map_err(|_| BotError::Thread("bot loop panicked".into()))?;
        }
        log::info!("Bot stopped");
        Ok(())
    }

    /// Stage a new configuration.
    ///
    /// While idle it replaces the config used by the next start; while
    /// running it is loaded here (so errors surface immediately) and
    /// swapped in at the next cycle boundary, never torn mid-cycle.
    pub fn configure(&mut self, config: BotConfig) -> Result<()> {
        config.validate()?;
        if self.shared.running.load(Ordering::SeqCst) {
            let bundle = RunBundle::build(config.clone())?;
            *self.shared.staged.lock() = Some(bundle);
            self.sink.info("configuration staged for next cycle");
        }
        self.config = config;
        Ok(())
    }
}

impl Drop for MazeBot {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Summary of one cycle, for logs and tests
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Templates that matched above threshold this cycle
    pub matches: usize,
    /// Resolved event name, if any
    pub event: Option<String>,
    /// Score of the resolved event
    pub score: Option<f32>,
    /// Outcome of the executed sequence, if an event resolved
    pub outcome: Option<ExecutionOutcome>,
}

/// Run one capture→match→resolve→act cycle.
///
/// Free function so tests can drive cycles synchronously without a
/// thread or timer. Capture errors bubble up; the caller decides
/// whether they pause or kill the run.
pub fn run_cycle<D: InputDriver>(
    capture: &mut dyn CaptureSource,
    library: &TemplateLibrary,
    events: &[EventDefinition],
    executor: &mut ActionExecutor<D>,
    cancel: &CancelToken,
    sink: &LogSink,
    cycle: u64,
) -> Result<CycleReport> {
    let frame = capture.capture()?;
    let matches = match_frame(&frame, library);

    for hit in &matches {
        sink.emit(
            LogEntry::new(
                LogLevel::Debug,
                format!(
                    "seen {} at ({}, {})",
                    hit.key, hit.location.x, hit.location.y
                ),
            )
            .with_score(hit.score)
            .with_cycle(cycle),
        );
    }

    let Some(resolved) = resolve(&matches, events) else {
        sink.emit(LogEntry::new(LogLevel::Debug, "no event").with_cycle(cycle));
        return Ok(CycleReport {
            cycle,
            matches: matches.len(),
            event: None,
            score: None,
            outcome: None,
        });
    };

    let (cx, cy) = resolved.location.center();
    let context = ExecutionContext {
        window: frame.region,
        anchor: Some(frame.region.to_screen_px(cx, cy)),
    };
    let outcome = executor.execute(&resolved.event.actions, &context, cancel);

    let entry = match &outcome {
        ExecutionOutcome::Completed => LogEntry::new(LogLevel::Info, "event handled"),
        ExecutionOutcome::Interrupted => {
            LogEntry::new(LogLevel::Warn, "action sequence interrupted")
        }
        ExecutionOutcome::Failed { step, reason } => LogEntry::new(
            LogLevel::Warn,
            format!("action step {step} failed: {reason}; cycle skipped"),
        ),
    };
    sink.emit(
        entry
            .with_event(resolved.event.name.clone())
            .with_score(resolved.score)
            .with_cycle(cycle),
    );

    Ok(CycleReport {
        cycle,
        matches: matches.len(),
        event: Some(resolved.event.name.clone()),
        score: Some(resolved.score),
        outcome: Some(outcome),
    })
}

/// The worker thread body
fn run_bot_loop(
    shared: Arc<Shared>,
    mut bundle: RunBundle,
    capture_factory: CaptureFactory,
    driver_factory: DriverFactory,
    sink: LogSink,
) {
    let driver = match driver_factory() {
        Ok(driver) => driver,
        Err(e) => {
            sink.error(format!("input backend unavailable: {e}"));
            let mut state = shared.state.lock();
            state.last_error = Some(e.to_string());
            state.status = RunStatus::Idle;
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };
    let mut executor =
        ActionExecutor::new(driver).with_timing_multiplier(bundle.config.timing_multiplier());

    let mut capture: Option<Box<dyn CaptureSource>> = None;
    let mut cycle: u64 = 0;
    sink.info("bot loop started");

    while shared.running.load(Ordering::SeqCst) {
        // Configuration swaps only happen here, between cycles
        if let Some(next) = shared.staged.lock().take() {
            if next.config.window_title != bundle.config.window_title {
                capture = None;
            }
            executor.set_timing_multiplier(next.config.timing_multiplier());
            bundle = next;
            sink.info("configuration applied");
        }

        if shared.pause_requested.load(Ordering::SeqCst) {
            {
                let mut state = shared.state.lock();
                if state.status != RunStatus::Paused {
                    state.status = RunStatus::Paused;
                    drop(state);
                    sink.info("paused");
                }
            }
            thread::sleep(PAUSE_POLL);
            continue;
        }
        {
            let mut state = shared.state.lock();
            if state.status == RunStatus::Paused {
                state.status = RunStatus::Running;
                drop(state);
                sink.info("resumed");
            }
        }

        if capture.is_none() {
            match (capture_factory)(&bundle.config) {
                Ok(source) => {
                    shared.state.lock().window_title =
                        Some(bundle.config.window_title.clone());
                    capture = Some(source);
                }
                Err(e) => {
                    pause_on_transient(&shared, &sink, &e);
                    continue;
                }
            }
        }
        let Some(source) = capture.as_mut() else {
            continue;
        };

        cycle += 1;
        let report = run_cycle(
            source.as_mut(),
            &bundle.library,
            &bundle.events,
            &mut executor,
            &shared.cancel,
            &sink,
            cycle,
        );

        match report {
            Ok(report) => {
                {
                    let mut state = shared.state.lock();
                    state.cycle = cycle;
                    if let Some(event) = &report.event {
                        state.last_event = Some(event.clone());
                    }
                }
                // Let the screen settle after an acted-on event
                if report.outcome.is_some() {
                    let settle = scaled(bundle.config.settle_delay_ms, &bundle.config);
                    sleep_cancellable(settle, &shared);
                }
            }
            Err(e) if e.is_transient() => {
                if matches!(e, BotError::WindowNotFound(_)) {
                    capture = None;
                }
                pause_on_transient(&shared, &sink, &e);
                continue;
            }
            Err(e) => {
                sink.error(format!("fatal at cycle {cycle}: {e}"));
                shared.state.lock().last_error = Some(e.to_string());
                break;
            }
        }

        let interval = scaled(bundle.config.cycle_interval_ms, &bundle.config);
        sleep_cancellable(interval, &shared);
    }

    shared.running.store(false, Ordering::SeqCst);
    shared.pause_requested.store(false, Ordering::SeqCst);
    shared.state.lock().status = RunStatus::Idle;
    sink.info("bot loop stopped");
}

/// Record a recoverable error and park the loop until resumed
fn pause_on_transient(shared: &Shared, sink: &LogSink, error: &BotError) {
    sink.warn(format!("{error}; run paused, re-pick the window and resume"));
    shared.state.lock().last_error = Some(error.to_string());
    shared.pause_requested.store(true, Ordering::SeqCst);
}

fn scaled(ms: u64, config: &BotConfig) -> Duration {
    Duration::from_millis((ms as f32 * config.timing_multiplier()) as u64)
}

/// Sleep in slices so stop requests land promptly
fn sleep_cancellable(total: Duration, shared: &Shared) {
    let mut slept = Duration::ZERO;
    while slept < total && shared.running.load(Ordering::SeqCst) {
        let slice = SLEEP_SLICE.min(total - slept);
        thread::sleep(slice);
        slept += slice;
    }
}
