//! The fixed, ordered rule set of the trigger engine.
//!
//! Each [`TriggerRule`] pairs a [`Guard`] over the session state with a
//! [`Matcher`] over settled screen text. When both hold, its [`Reaction`]
//! decides what to type and its transitions update the state. Rules are
//! built once from [`PilotConfig`] and evaluated in list order; the first
//! rule that matches wins.

use regex::Regex;

use adomate_types::{describe_key, AdomateError, PilotConfig};

use crate::state::Flag;

/// Session-state precondition of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    /// The startup sequence is active, or nothing else is in progress.
    StartupOrIdle,
    Saving,
    Quitting,
    Drinking,
    /// A save file was loaded for this run.
    SaveLoaded,
}

/// Text condition of a rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    /// Any of the messages occurs as a substring.
    AnyOf(Vec<String>),
    /// Any non-empty text.
    Anything,
}

/// What a matched rule types or shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Inject fixed bytes.
    Send(Vec<u8>),
    /// Inject the text of the first capture group.
    SendCapture,
    /// Inject `key` when auto-repeat is on, otherwise show `notice` to the human.
    OfferDrink { key: Vec<u8>, notice: String },
    /// Inject `prefix`, followed by `key` when auto-repeat is on.
    RepeatDrink { prefix: Vec<u8>, key: Vec<u8> },
    /// Inject nothing.
    Ignore,
}

/// State change applied when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Set(Flag),
    Clear(Flag),
}

/// A named, guarded pattern with its reaction.
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub name: &'static str,
    pub guard: Guard,
    pub matcher: Matcher,
    pub reaction: Reaction,
    pub transitions: Vec<Transition>,
}

impl Matcher {
    /// Match `text`, returning the first capture group (if any) on success.
    pub fn find<'t>(&self, text: &'t str) -> Option<Option<&'t str>> {
        match self {
            Matcher::Regex(re) => re
                .captures(text)
                .map(|caps| caps.get(1).map(|m| m.as_str())),
            Matcher::AnyOf(messages) => messages
                .iter()
                .any(|m| !m.is_empty() && text.contains(m.as_str()))
                .then_some(None),
            Matcher::Anything => (!text.is_empty()).then_some(None),
        }
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, AdomateError> {
    Regex::new(pattern)
        .map_err(|e| AdomateError::ConfigError(format!("invalid pattern {name:?}: {e}")))
}

fn bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

fn rule(
    name: &'static str,
    guard: Guard,
    matcher: Matcher,
    reaction: Reaction,
    transitions: &[Transition],
) -> TriggerRule {
    TriggerRule {
        name,
        guard,
        matcher,
        reaction,
        transitions: transitions.to_vec(),
    }
}

/// Build the ordered rule set from configuration.
///
/// Fails if a pattern does not compile or the advert pattern has no
/// capture group for the exit key.
pub fn build_rules(config: &PilotConfig) -> Result<Vec<TriggerRule>, AdomateError> {
    use Transition::{Clear, Set};

    let p = &config.patterns;
    let keys = &config.keys;

    let advert = compile("advert_exit", &p.advert_exit)?;
    if advert.captures_len() < 2 {
        return Err(AdomateError::ConfigError(
            "pattern \"advert_exit\" needs a capture group for the exit key".into(),
        ));
    }

    let pool_notice = format!(
        "[adomate] There is a pool here. Press {} to toggle auto-drinking.",
        describe_key(&keys.toggle)
    );
    let mut good = bytes("\n");
    good.extend_from_slice(keys.save.as_bytes());

    Ok(vec![
        rule(
            "menu-reached",
            Guard::StartupOrIdle,
            Matcher::Regex(compile("menu_reached", &p.menu_reached)?),
            Reaction::Send(bytes(&keys.start_game)),
            &[],
        ),
        rule(
            "advert-exit",
            Guard::StartupOrIdle,
            Matcher::Regex(advert),
            Reaction::SendCapture,
            &[Clear(Flag::Startup)],
        ),
        rule(
            "save-confirm",
            Guard::Always,
            Matcher::Regex(compile("save_confirm", &p.save_confirm)?),
            Reaction::Send(bytes(&keys.confirm)),
            &[Set(Flag::Save)],
        ),
        rule(
            "save-press-space",
            Guard::Saving,
            Matcher::Regex(compile("press_space", &p.press_space)?),
            Reaction::Send(bytes(" ")),
            &[],
        ),
        rule(
            "save-credits-or-quit",
            Guard::Saving,
            Matcher::Regex(compile("credits_or_quit", &p.credits_or_quit)?),
            Reaction::Send(bytes(&keys.quit)),
            &[Clear(Flag::Save)],
        ),
        rule(
            "quit-confirm",
            Guard::Always,
            Matcher::Regex(compile("quit_confirm", &p.quit_confirm)?),
            Reaction::Send(bytes(&keys.confirm)),
            &[Set(Flag::Quit)],
        ),
        rule(
            "quit-exit-footer",
            Guard::Quitting,
            Matcher::Regex(compile("exit_footer", &p.exit_footer)?),
            Reaction::Send(bytes(&keys.dismiss)),
            &[],
        ),
        rule(
            "quit-main-menu",
            Guard::Quitting,
            Matcher::Regex(compile("main_menu_or_quit", &p.main_menu_or_quit)?),
            Reaction::Send(bytes(&keys.quit)),
            &[Clear(Flag::Quit)],
        ),
        rule(
            "quit-more",
            Guard::Quitting,
            Matcher::Regex(compile("more", &p.more)?),
            Reaction::Send(bytes(&keys.more)),
            &[],
        ),
        rule(
            "pool-seen",
            Guard::Always,
            Matcher::Regex(compile("pool_seen", &p.pool_seen)?),
            Reaction::OfferDrink {
                key: bytes(&keys.drink),
                notice: pool_notice,
            },
            &[],
        ),
        rule(
            "drink-confirm",
            Guard::SaveLoaded,
            Matcher::Regex(compile("drink_confirm", &p.drink_confirm)?),
            Reaction::Send(bytes(&keys.confirm)),
            &[Set(Flag::Drinking)],
        ),
        rule(
            "drink-bad",
            Guard::Drinking,
            Matcher::AnyOf(config.drinking.bad.clone()),
            Reaction::Send(bytes(&keys.bail_out)),
            &[Clear(Flag::Drinking), Set(Flag::Quit), Set(Flag::Restart)],
        ),
        rule(
            "drink-good",
            Guard::Drinking,
            Matcher::AnyOf(config.drinking.good.clone()),
            Reaction::Send(good),
            &[Clear(Flag::Drinking), Set(Flag::Save), Set(Flag::Restart)],
        ),
        rule(
            "drink-neutral",
            Guard::Drinking,
            Matcher::AnyOf(config.drinking.neutral.clone()),
            Reaction::RepeatDrink {
                prefix: Vec::new(),
                key: bytes(&keys.drink),
            },
            &[Clear(Flag::Drinking)],
        ),
        rule(
            "drink-frog",
            Guard::Drinking,
            Matcher::Regex(compile("frog", &p.frog)?),
            Reaction::RepeatDrink {
                prefix: bytes(&keys.more.repeat(2)),
                key: bytes(&keys.drink),
            },
            &[Clear(Flag::Drinking)],
        ),
        rule(
            "drink-wish",
            Guard::Drinking,
            Matcher::Regex(compile("wish", &p.wish)?),
            Reaction::Ignore,
            &[Clear(Flag::Drinking)],
        ),
        rule(
            "drink-other",
            Guard::Drinking,
            Matcher::Anything,
            Reaction::Ignore,
            &[Clear(Flag::Drinking)],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_build_in_priority_order() {
        let rules = build_rules(&PilotConfig::default()).unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"menu-reached"));
        assert_eq!(names.last(), Some(&"drink-other"));
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("advert-exit") < pos("save-confirm"));
        assert!(pos("save-confirm") < pos("quit-confirm"));
        assert!(pos("pool-seen") < pos("drink-confirm"));
        assert!(pos("drink-bad") < pos("drink-good"));
        assert!(pos("drink-good") < pos("drink-neutral"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let mut config = PilotConfig::default();
        config.patterns.pool_seen = "[unclosed".into();
        let err = build_rules(&config).unwrap_err();
        assert!(err.to_string().contains("pool_seen"), "{err}");
    }

    #[test]
    fn advert_pattern_needs_capture_group() {
        let mut config = PilotConfig::default();
        config.patterns.advert_exit = r"Exit -+$".into();
        assert!(matches!(
            build_rules(&config),
            Err(AdomateError::ConfigError(_))
        ));
    }

    #[test]
    fn any_of_matches_substrings_and_skips_empty_messages() {
        let matcher = Matcher::AnyOf(vec![String::new(), "You age!".into()]);
        assert_eq!(matcher.find("Ouch. You age! Ouch."), Some(None));
        assert_eq!(matcher.find("You feel fine"), None);
    }

    #[test]
    fn anything_requires_text() {
        assert_eq!(Matcher::Anything.find(""), None);
        assert_eq!(Matcher::Anything.find("x"), Some(None));
    }

    #[test]
    fn regex_returns_first_capture() {
        let matcher = Matcher::Regex(Regex::new(r"\[(.)\] Exit").unwrap());
        assert_eq!(matcher.find("-- [x] Exit --"), Some(Some("x")));
        let plain = Matcher::Regex(Regex::new(r"Exit").unwrap());
        assert_eq!(plain.find("Exit"), Some(None));
    }
}
