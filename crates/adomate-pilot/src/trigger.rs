//! Trigger engine: maps settled screen text to keystrokes and state changes.
//!
//! The engine owns the immutable rule list built by [`crate::rules`]. Given a
//! normalized snapshot and the current [`SessionState`], [`TriggerEngine::evaluate`]
//! returns what to inject, what to tell the human, and the next state. It is
//! pure: the same input always yields the same [`Evaluation`], and a snapshot
//! no rule matches changes nothing.

use tracing::debug;

use adomate_types::{describe_key, AdomateError, PilotConfig};

use crate::rules::{build_rules, Guard, Reaction, Transition, TriggerRule};
use crate::state::SessionState;

/// Facts about the current run that rules may depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineContext {
    /// The game was launched with a save to load.
    pub save_loaded: bool,
}

/// Result of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Name of the rule that fired, if any.
    pub rule: Option<&'static str>,
    /// Bytes to write to the game's input.
    pub inject: Option<Vec<u8>>,
    /// Line to show on the human's terminal, bypassing the game.
    pub notice: Option<String>,
    /// State after this evaluation.
    pub state: SessionState,
}

impl Evaluation {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            rule: None,
            inject: None,
            notice: None,
            state: *state,
        }
    }
}

/// Ordered, first-match-wins dispatcher over [`TriggerRule`]s.
#[derive(Debug)]
pub struct TriggerEngine {
    rules: Vec<TriggerRule>,
    context: EngineContext,
    drink_key: Vec<u8>,
    toggle_name: String,
}

impl TriggerEngine {
    /// Build an engine from configuration for one run.
    pub fn new(config: &PilotConfig, context: EngineContext) -> Result<Self, AdomateError> {
        Ok(Self {
            rules: build_rules(config)?,
            context,
            drink_key: config.keys.drink.as_bytes().to_vec(),
            toggle_name: describe_key(&config.keys.toggle),
        })
    }

    /// Evaluate a normalized snapshot against the rules.
    pub fn evaluate(&self, text: &str, state: &SessionState) -> Evaluation {
        if text.is_empty() {
            return Evaluation::unchanged(state);
        }

        for rule in &self.rules {
            if !self.guard_holds(rule.guard, state) {
                continue;
            }
            let Some(capture) = rule.matcher.find(text) else {
                continue;
            };

            let (inject, notice) = match &rule.reaction {
                Reaction::Send(bytes) => (Some(bytes.clone()), None),
                Reaction::SendCapture => match capture {
                    Some(key) if !key.is_empty() => (Some(key.as_bytes().to_vec()), None),
                    _ => {
                        debug!(rule = rule.name, "pattern matched without capture, skipping");
                        continue;
                    }
                },
                Reaction::OfferDrink { key, notice } => {
                    if state.drinking_auto_repeat {
                        (Some(key.clone()), None)
                    } else {
                        (None, Some(notice.clone()))
                    }
                }
                Reaction::RepeatDrink { prefix, key } => {
                    let mut bytes = prefix.clone();
                    if state.drinking_auto_repeat {
                        bytes.extend_from_slice(key);
                    }
                    ((!bytes.is_empty()).then_some(bytes), None)
                }
                Reaction::Ignore => (None, None),
            };

            let mut next = *state;
            for transition in &rule.transitions {
                match *transition {
                    Transition::Set(flag) => next.set(flag, true),
                    Transition::Clear(flag) => next.set(flag, false),
                }
            }

            debug!(
                rule = rule.name,
                inject = ?inject.as_deref().map(String::from_utf8_lossy),
                state = %next,
                "trigger fired"
            );

            return Evaluation {
                rule: Some(rule.name),
                inject,
                notice,
                state: next,
            };
        }

        Evaluation::unchanged(state)
    }

    /// Flip auto-drinking in response to the human's toggle key.
    ///
    /// Turning it on drinks once immediately.
    pub fn toggle_auto_repeat(&self, state: &SessionState) -> Evaluation {
        let mut next = *state;
        next.drinking_auto_repeat = !state.drinking_auto_repeat;

        let (inject, notice) = if next.drinking_auto_repeat {
            (
                Some(self.drink_key.clone()),
                format!(
                    "[adomate] Auto-drinking enabled. Press {} to stop.",
                    self.toggle_name
                ),
            )
        } else {
            (None, "[adomate] Auto-drinking disabled.".to_string())
        };

        debug!(enabled = next.drinking_auto_repeat, "auto-drinking toggled");

        Evaluation {
            rule: Some("toggle-auto-repeat"),
            inject,
            notice: Some(notice),
            state: next,
        }
    }

    fn guard_holds(&self, guard: Guard, state: &SessionState) -> bool {
        match guard {
            Guard::Always => true,
            Guard::StartupOrIdle => state.in_startup_sequence || !state.in_any_sequence(),
            Guard::Saving => state.in_save_sequence,
            Guard::Quitting => state.in_quit_sequence,
            Guard::Drinking => state.in_drinking_sequence,
            Guard::SaveLoaded => self.context.save_loaded,
        }
    }
}
