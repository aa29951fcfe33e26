//! Event resolution
//!
//! Decides which single maze event, if any, is active this cycle.
//! Pure and deterministic: capture and matching are the only
//! non-deterministic inputs to the whole pipeline.

use serde::{Deserialize, Serialize};

use crate::action::ActionSequence;
use crate::matcher::{MatchResult, Rect};

/// A named maze situation and the response it triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Event name, e.g. "event_boss"
    pub name: String,
    /// Template keys that identify this event
    pub templates: Vec<String>,
    /// Priority rank; lower wins
    pub priority: u32,
    /// Minimum score any of the event's templates must reach
    pub threshold: f32,
    /// Input sequence dispatched when this event resolves
    pub actions: ActionSequence,
}

impl EventDefinition {
    /// Convenience constructor for tests and embedding callers
    pub fn new(name: impl Into<String>, template: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            templates: vec![template.into()],
            priority,
            threshold: 0.0,
            actions: ActionSequence::default(),
        }
    }

    /// Set the detection threshold, clamped into `[0, 1]`
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the action sequence
    pub fn with_actions(mut self, actions: ActionSequence) -> Self {
        self.actions = actions;
        self
    }
}

/// The event chosen for this cycle, with the match that satisfied it
#[derive(Debug, Clone)]
pub struct ResolvedEvent<'a> {
    pub event: &'a EventDefinition,
    /// Best score among the event's templates
    pub score: f32,
    /// Location of the best-scoring template, in frame coordinates
    pub location: Rect,
}

/// Pick the single active event, or none.
///
/// An event is satisfied when any of its templates matched at or above
/// the event's threshold; among satisfied events the lowest priority
/// rank wins, ties break by descending score, then by declaration
/// order. When several templates of one event cross the threshold the
/// event scores with the best of them.
pub fn resolve<'a>(
    matches: &[MatchResult],
    events: &'a [EventDefinition],
) -> Option<ResolvedEvent<'a>> {
    let mut best: Option<(usize, f32, Rect)> = None;

    for (index, event) in events.iter().enumerate() {
        let hit = matches
            .iter()
            .filter(|m| m.score >= event.threshold && event.templates.iter().any(|k| *k == m.key))
            .max_by(|a, b| a.score.total_cmp(&b.score));
        let Some(hit) = hit else { continue };

        let wins = match &best {
            None => true,
            Some((best_index, best_score, _)) => {
                let current = &events[*best_index];
                event.priority < current.priority
                    || (event.priority == current.priority && hit.score > *best_score)
                // Equal priority and score: the earlier declaration
                // stands, because iteration is in declaration order.
            }
        };
        if wins {
            best = Some((index, hit.score, hit.location));
        }
    }

    best.map(|(index, score, location)| ResolvedEvent {
        event: &events[index],
        score,
        location,
    })
}
