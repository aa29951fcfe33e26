//! Command requests posted from the UI context

use std::time::{Duration, Instant};

/// Lifecycle commands the UI or hotkeys may request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Default suppression window for repeated commands
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Suppresses hotkey chatter: a command identical to the previous one
/// inside the window is dropped, so rapid repeats cannot stack
/// overlapping transitions.
#[derive(Debug)]
pub struct CommandDebouncer {
    window: Duration,
    last: Option<(BotCommand, Instant)>,
}

impl Default for CommandDebouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl CommandDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether this command should be acted on
    pub fn accept(&mut self, command: BotCommand) -> bool {
        self.accept_at(command, Instant::now())
    }

    fn accept_at(&mut self, command: BotCommand, now: Instant) -> bool {
        if let Some((previous, at)) = self.last {
            if previous == command && now.duration_since(at) < self.window {
                return false;
            }
        }
        self.last = Some((command, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_inside_window_dropped() {
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert!(debouncer.accept_at(BotCommand::Start, t0));
        assert!(!debouncer.accept_at(BotCommand::Start, t0 + Duration::from_millis(50)));
        assert!(!debouncer.accept_at(BotCommand::Start, t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_repeat_after_window_accepted() {
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert!(debouncer.accept_at(BotCommand::Stop, t0));
        assert!(debouncer.accept_at(BotCommand::Stop, t0 + Duration::from_millis(300)));
    }

    #[test]
    fn test_different_command_passes_immediately() {
        let mut debouncer = CommandDebouncer::new(Duration::from_millis(250));
        let t0 = Instant::now();
        assert!(debouncer.accept_at(BotCommand::Start, t0));
        assert!(debouncer.accept_at(BotCommand::Stop, t0 + Duration::from_millis(10)));
        // The window now tracks the stop, so a quick second stop drops
        assert!(!debouncer.accept_at(BotCommand::Stop, t0 + Duration::from_millis(20)));
    }
}
