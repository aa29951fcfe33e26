//! Synthetic input dispatch
//!
//! The executor talks to an [`InputDriver`]; the real one wraps enigo,
//! while [`RecordingDriver`] captures dispatched input for tests and
//! dry runs.

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{BotError, Result};

/// OS input boundary for the action executor
pub trait InputDriver: Send {
    /// Move to screen coordinates and click the left button
    fn click(&mut self, x: i32, y: i32) -> Result<()>;

    /// Tap a named key, e.g. "enter", "f4", "a"
    fn key_tap(&mut self, key: &str) -> Result<()>;
}

impl<D: InputDriver + ?Sized> InputDriver for Box<D> {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).click(x, y)
    }

    fn key_tap(&mut self, key: &str) -> Result<()> {
        (**self).key_tap(key)
    }
}

/// Real input driver over enigo
pub struct EnigoDriver {
    enigo: Enigo,
}

impl EnigoDriver {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| BotError::ActionDispatch(format!("input backend: {e}")))?;
        Ok(Self { enigo })
    }
}

impl InputDriver for EnigoDriver {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| BotError::ActionDispatch(format!("mouse move: {e}")))?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| BotError::ActionDispatch(format!("mouse click: {e}")))?;
        Ok(())
    }

    fn key_tap(&mut self, key: &str) -> Result<()> {
        let key = parse_key(key)?;
        self.enigo
            .key(key, Direction::Click)
            .map_err(|e| BotError::ActionDispatch(format!("key tap: {e}")))
    }
}

/// Map a key name from config to an enigo key
fn parse_key(name: &str) -> Result<Key> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        s => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(BotError::ActionDispatch(format!("unknown key '{name}'")));
                }
            }
        }
    };
    Ok(key)
}

/// An input action as dispatched to the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchedInput {
    Click { x: i32, y: i32 },
    Key(String),
}

/// Driver that records instead of dispatching; shareable across
/// threads so a test can inspect what the loop sent
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    inputs: Arc<Mutex<Vec<DispatchedInput>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything dispatched so far, in order
    pub fn dispatched(&self) -> Vec<DispatchedInput> {
        self.inputs.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inputs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.lock().is_empty()
    }
}

impl InputDriver for RecordingDriver {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.inputs.lock().push(DispatchedInput::Click { x, y });
        Ok(())
    }

    fn key_tap(&mut self, key: &str) -> Result<()> {
        self.inputs.lock().push(DispatchedInput::Key(key.to_string()));
        Ok(())
    }
}
