//! Bot configuration
//!
//! The settings record consumed by the engine, loaded from TOML by the
//! control panel. The engine treats a loaded [`BotConfig`] as read-only
//! and swaps it only while idle or at a cycle boundary.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::action::{ActionSequence, ActionStep};
use crate::error::{BotError, Result};
use crate::resolver::EventDefinition;
use crate::template::TemplateLibrary;

/// Multiplier applied to waits while low-power mode is on
const LOW_POWER_MULTIPLIER: f32 = 1.5;

/// Fractional sub-rectangle of the capture frame, each bound in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RegionConfig {
    /// Create a region, clamping all bounds into `[0, 1]`
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
        .clamped()
    }

    /// Clamp all bounds into `[0, 1]`
    pub fn clamped(self) -> Self {
        Self {
            left: self.left.clamp(0.0, 1.0),
            top: self.top.clamp(0.0, 1.0),
            right: self.right.clamp(0.0, 1.0),
            bottom: self.bottom.clamp(0.0, 1.0),
        }
    }

    /// A region is usable when it spans a non-empty area
    pub fn is_well_formed(&self) -> bool {
        let c = self.clamped();
        c.left < c.right && c.top < c.bottom
    }
}

/// One maze event: templates to look for and how to respond
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Event name, e.g. "event_boss"
    pub name: String,
    /// Template keys that identify this event; any one of them matching
    /// at or above the threshold satisfies the event
    pub templates: Vec<String>,
    /// Priority rank; lower wins
    #[serde(default)]
    pub priority: u32,
    /// Detection threshold; falls back to the main threshold when absent
    pub threshold: Option<f32>,
    /// Input sequence dispatched when this event resolves
    #[serde(default)]
    pub actions: Vec<ActionStep>,
}

/// Event priority list; accepts either a TOML array or the legacy
/// comma-separated string form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriorityList {
    List(Vec<String>),
    Csv(String),
}

impl PriorityList {
    /// Event names in priority order, trimmed, empties dropped
    pub fn names(&self) -> Vec<String> {
        match self {
            PriorityList::List(items) => items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            PriorityList::Csv(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// A validated hotkey combo such as `ctrl+f4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: Vec<String>,
    pub key: String,
}

const KNOWN_MODIFIERS: &[&str] = &["ctrl", "shift", "alt", "win"];

/// Parse a hotkey combo string like `f4` or `ctrl+shift+m`
pub fn parse_hotkey(raw: &str) -> Result<Hotkey> {
    let parts: Vec<String> = raw.split('+').map(|p| p.trim().to_lowercase()).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(BotError::ConfigInvalid(format!("malformed hotkey '{raw}'")));
    }
    let (key, modifiers) = parts.split_last().expect("split always yields one part");
    for m in modifiers {
        if !KNOWN_MODIFIERS.contains(&m.as_str()) {
            return Err(BotError::ConfigInvalid(format!(
                "unknown hotkey modifier '{m}' in '{raw}'"
            )));
        }
    }
    Ok(Hotkey {
        modifiers: modifiers.to_vec(),
        key: key.clone(),
    })
}

/// Full settings record for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Substring of the game window title to bind
    #[serde(default)]
    pub window_title: String,
    /// Directory scanned for template PNGs
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    /// Default detection threshold for templates and events
    #[serde(default = "default_main_threshold")]
    pub main_threshold: f32,
    /// Sleep between cycles, in milliseconds
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Extra settle delay after an executed action sequence
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Lengthen waits to reduce CPU/input frequency
    #[serde(default)]
    pub low_power: bool,
    /// Hotkey combo that requests a start
    #[serde(default = "default_hotkey_start")]
    pub hotkey_start: String,
    /// Hotkey combo that requests a stop
    #[serde(default = "default_hotkey_stop")]
    pub hotkey_stop: String,
    /// Emit verbose per-cycle candidate scores on the log channel
    #[serde(default)]
    pub debug: bool,
    /// Per-template threshold overrides, keyed by template key
    #[serde(default)]
    pub template_thresholds: HashMap<String, f32>,
    /// Per-template search regions, keyed by template key
    #[serde(default)]
    pub template_regions: HashMap<String, RegionConfig>,
    /// Optional priority ordering by event name; overrides per-event ranks
    #[serde(default)]
    pub event_priority: Option<PriorityList>,
    /// The events this run recognizes
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_main_threshold() -> f32 {
    0.76
}

fn default_cycle_interval_ms() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    20
}

fn default_hotkey_start() -> String {
    "f4".to_string()
}

fn default_hotkey_stop() -> String {
    "f3".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            window_title: String::new(),
            templates_dir: default_templates_dir(),
            main_threshold: default_main_threshold(),
            cycle_interval_ms: default_cycle_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            low_power: false,
            hotkey_start: default_hotkey_start(),
            hotkey_stop: default_hotkey_stop(),
            debug: false,
            template_thresholds: HashMap::new(),
            template_regions: HashMap::new(),
            event_priority: None,
            events: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BotError::ConfigInvalid(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BotError::ConfigInvalid(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&raw)
    }

    /// Set the target window title
    pub fn with_window(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Set the template directory
    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    /// Add an event
    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.events.push(event);
        self
    }

    /// Multiplier applied to waits and the cycle interval
    pub fn timing_multiplier(&self) -> f32 {
        if self.low_power {
            LOW_POWER_MULTIPLIER
        } else {
            1.0
        }
    }

    /// Check invariants that do not need the template library
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.main_threshold) {
            return Err(BotError::ConfigInvalid(format!(
                "main_threshold {} out of range [0, 1]",
                self.main_threshold
            )));
        }
        for (key, thr) in &self.template_thresholds {
            if !(0.0..=1.0).contains(thr) {
                return Err(BotError::ConfigInvalid(format!(
                    "threshold {thr} for template '{key}' out of range [0, 1]"
                )));
            }
        }
        for (key, region) in &self.template_regions {
            if !region.is_well_formed() {
                return Err(BotError::ConfigInvalid(format!(
                    "region for template '{key}' spans no area"
                )));
            }
        }
        for event in &self.events {
            if event.name.trim().is_empty() {
                return Err(BotError::ConfigInvalid("event with empty name".into()));
            }
            if event.templates.is_empty() {
                return Err(BotError::ConfigInvalid(format!(
                    "event '{}' references no templates",
                    event.name
                )));
            }
            if let Some(thr) = event.threshold {
                if !(0.0..=1.0).contains(&thr) {
                    return Err(BotError::ConfigInvalid(format!(
                        "threshold {thr} for event '{}' out of range [0, 1]",
                        event.name
                    )));
                }
            }
        }
        if !self.hotkey_start.trim().is_empty() {
            parse_hotkey(&self.hotkey_start)?;
        }
        if !self.hotkey_stop.trim().is_empty() {
            parse_hotkey(&self.hotkey_stop)?;
        }
        Ok(())
    }

    /// Build the resolved event table for a run.
    ///
    /// When `event_priority` is set, listed events are ranked by their
    /// position in the list; unlisted events keep their configured rank
    /// shifted past the end of the list.
    pub fn event_definitions(&self) -> Result<Vec<EventDefinition>> {
        self.validate()?;
        let order: Option<Vec<String>> = self.event_priority.as_ref().map(|p| p.names());
        let mut definitions = Vec::with_capacity(self.events.len());
        for event in &self.events {
            let priority = match &order {
                Some(names) => match names.iter().position(|n| n == &event.name) {
                    Some(pos) => pos as u32,
                    None => names.len() as u32 + event.priority,
                },
                None => event.priority,
            };
            let threshold = event
                .threshold
                .unwrap_or(self.main_threshold)
                .clamp(0.0, 1.0);
            definitions.push(EventDefinition {
                name: event.name.clone(),
                templates: event.templates.clone(),
                priority,
                threshold,
                actions: ActionSequence::from(event.actions.clone()),
            });
        }
        Ok(definitions)
    }

    /// Check that every template an event references exists in the library
    pub fn validate_template_refs(
        &self,
        events: &[EventDefinition],
        library: &TemplateLibrary,
    ) -> Result<()> {
        for event in events {
            for key in &event.templates {
                if !library.contains(key) {
                    return Err(BotError::ConfigInvalid(format!(
                        "event '{}' references missing template '{key}'",
                        event.name
                    )));
                }
            }
        }
        Ok(())
    }
}
