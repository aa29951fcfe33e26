//! Error types for the bot engine

use thiserror::Error;

/// Result type for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Error taxonomy for the bot engine
#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// Template directory missing, or a template file unreadable/corrupt
    #[error("template load failed: {0}")]
    TemplateLoad(String),

    /// Two template files map to the same key
    #[error("duplicate template key '{0}'")]
    DuplicateTemplate(String),

    /// A template key was requested that the library does not contain
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// The bound window is gone, or no window matches the configured title
    #[error("window not found: {0}")]
    WindowNotFound(String),

    /// Transient OS-level capture failure; retryable
    #[error("capture failed: {0}")]
    Capture(String),

    /// Configuration rejected at validation time
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// OS-level input dispatch failure
    #[error("input dispatch failed: {0}")]
    ActionDispatch(String),

    /// Start requested while the loop is already alive
    #[error("bot already running")]
    AlreadyRunning,

    /// Worker thread could not be spawned or joined
    #[error("worker thread error: {0}")]
    Thread(String),
}

impl BotError {
    /// Transient errors pause the run and leave it resumable; everything
    /// else is fatal to the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::WindowNotFound(_) | BotError::Capture(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BotError::Capture("screen gone".into()).is_transient());
        assert!(BotError::WindowNotFound("maze".into()).is_transient());
        assert!(!BotError::ConfigInvalid("bad threshold".into()).is_transient());
        assert!(!BotError::TemplateLoad("missing dir".into()).is_transient());
        assert!(!BotError::ActionDispatch("no display".into()).is_transient());
    }
}
