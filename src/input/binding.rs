//! Activator bindings
//!
//! An activator is one or more alternatives separated by `|`, each made of
//! `<modifier>` tokens followed by a single `KEY_*` or `BTN_*` name:
//!
//! ```text
//! <super> KEY_Q | <alt> KEY_F4
//! <ctrl> <alt> KEY_BACKSPACE
//! BTN_LEFT
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::keycodes::{button_code, key_code};
use super::Modifiers;

/// What a binding alternative is triggered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Key(u32),
    Button(u32),
}

/// Where an activation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivatorSource {
    Keybinding,
    Buttonbinding,
}

/// One alternative of an activator: exact modifier set plus trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingParseError {
    #[error("empty binding")]
    Empty,
    #[error("unknown modifier <{0}>")]
    UnknownModifier(String),
    #[error("unknown key or button {0}")]
    UnknownName(String),
    #[error("binding alternative `{0}` needs exactly one key or button")]
    TriggerCount(String),
}

/// A parsed activator binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatorBinding {
    alternatives: Vec<Chord>,
}

impl ActivatorBinding {
    pub fn new(alternatives: Vec<Chord>) -> Self {
        Self { alternatives }
    }

    /// A binding on a single key or button with no modifiers
    pub fn single(trigger: Trigger) -> Self {
        Self::new(vec![Chord {
            modifiers: Modifiers::NONE,
            trigger,
        }])
    }

    pub fn alternatives(&self) -> &[Chord] {
        &self.alternatives
    }

    pub fn matches(&self, modifiers: Modifiers, trigger: Trigger) -> bool {
        self.alternatives
            .iter()
            .any(|chord| chord.modifiers == modifiers && chord.trigger == trigger)
    }
}

fn parse_alternative(text: &str) -> Result<Chord, BindingParseError> {
    let spaced = text.replace('>', "> ");
    let mut modifiers = Modifiers::NONE;
    let mut trigger = None;
    let mut triggers = 0;

    for token in spaced.split_whitespace() {
        if let Some(name) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            let modifier = Modifiers::from_binding_name(name)
                .ok_or_else(|| BindingParseError::UnknownModifier(name.to_string()))?;
            modifiers |= modifier;
            continue;
        }

        triggers += 1;
        trigger = if token.starts_with("BTN_") {
            button_code(token).map(Trigger::Button)
        } else {
            key_code(token).map(Trigger::Key)
        };
        if trigger.is_none() {
            return Err(BindingParseError::UnknownName(token.to_string()));
        }
    }

    match (trigger, triggers) {
        (Some(trigger), 1) => Ok(Chord { modifiers, trigger }),
        _ => Err(BindingParseError::TriggerCount(text.trim().to_string())),
    }
}

impl FromStr for ActivatorBinding {
    type Err = BindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("none") {
            return Err(BindingParseError::Empty);
        }

        let alternatives = s
            .split('|')
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(alternatives))
    }
}

impl fmt::Display for ActivatorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chord) in self.alternatives.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            for name in chord.modifiers.names() {
                write!(f, "<{}> ", name)?;
            }
            match chord.trigger {
                Trigger::Key(code) => write!(f, "key:{}", code)?,
                Trigger::Button(code) => write!(f, "button:{:#x}", code)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keycodes::{BTN_LEFT, KEY_BACKSPACE};

    #[test]
    fn test_parse_alternatives() {
        let binding: ActivatorBinding = "<super> KEY_Q | <alt> KEY_F4".parse().unwrap();
        assert_eq!(binding.alternatives().len(), 2);
        assert!(binding.matches(Modifiers::SUPER, Trigger::Key(16)));
        assert!(binding.matches(Modifiers::ALT, Trigger::Key(62)));
        assert!(!binding.matches(Modifiers::NONE, Trigger::Key(16)));
    }

    #[test]
    fn test_parse_stacked_modifiers_without_spaces() {
        let binding: ActivatorBinding = "<ctrl><alt>KEY_BACKSPACE".parse().unwrap();
        assert!(binding.matches(Modifiers::CTRL | Modifiers::ALT, Trigger::Key(KEY_BACKSPACE)));
        assert!(!binding.matches(Modifiers::CTRL, Trigger::Key(KEY_BACKSPACE)));
    }

    #[test]
    fn test_parse_button() {
        let binding: ActivatorBinding = "BTN_LEFT".parse().unwrap();
        assert_eq!(binding, ActivatorBinding::single(Trigger::Button(BTN_LEFT)));
    }

    #[test]
    fn test_malformed_bindings_are_rejected() {
        assert_eq!("".parse::<ActivatorBinding>(), Err(BindingParseError::Empty));
        assert_eq!("none".parse::<ActivatorBinding>(), Err(BindingParseError::Empty));
        assert_eq!(
            "<hyper> KEY_A".parse::<ActivatorBinding>(),
            Err(BindingParseError::UnknownModifier("hyper".into()))
        );
        assert_eq!(
            "<super> KEY_WHAT".parse::<ActivatorBinding>(),
            Err(BindingParseError::UnknownName("KEY_WHAT".into()))
        );
        assert!(matches!(
            "<super> KEY_A KEY_B".parse::<ActivatorBinding>(),
            Err(BindingParseError::TriggerCount(_))
        ));
        assert!(matches!(
            "<super>".parse::<ActivatorBinding>(),
            Err(BindingParseError::TriggerCount(_))
        ));
    }
}
