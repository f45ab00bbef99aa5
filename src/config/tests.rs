//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, command binding resolution and
//! edge cases in configuration handling.

use super::*;
use crate::input::{Modifiers, Trigger};
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = ShellConfig::default();

    assert!(config.validate().is_ok());
    assert!(config.core.plugins.iter().any(|p| p == "focus"));
    assert!(config.input.kb_repeat_delay > 0);
    assert!(config.input.kb_repeat_rate > 0);
    assert!(config.command.is_empty());
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("shell.toml");

    let test_config = r#"
[core]
plugins = ["focus", "command"]

[input]
kb_repeat_delay = 200
kb_repeat_rate = 4

[command]
command_terminal = "alacritty"
binding_terminal = "<super> KEY_ENTER"
command_volume_up = "pactl set-sink-volume @DEFAULT_SINK@ +5%"
repeatable_binding_volume_up = "<super> KEY_U"
"#;
    fs::write(&file_path, test_config)?;

    let config = ShellConfig::load(&file_path)?;
    assert_eq!(config.core.plugins, vec!["focus".to_string(), "command".to_string()]);
    assert_eq!(config.input.kb_repeat_delay, 200);
    assert_eq!(config.input.kb_repeat_rate, 4);
    assert_eq!(config.command.get("command_terminal"), Some("alacritty"));

    // Unspecified sections fall back to defaults
    assert_eq!(config.core.exit_binding, CoreConfig::default().exit_binding);

    Ok(())
}

#[test]
fn test_partial_sections_use_field_defaults() -> Result<()> {
    let config: ShellConfig = toml::from_str("[input]\nkb_repeat_rate = 25\n")?;
    assert_eq!(config.input.kb_repeat_rate, 25);
    assert_eq!(config.input.kb_repeat_delay, InputConfig::default().kb_repeat_delay);
    assert_eq!(config.core, CoreConfig::default());
    Ok(())
}

#[test]
fn test_invalid_configuration_rejected() -> Result<()> {
    let dir = tempdir()?;

    let file_path = dir.path().join("bad_plugin.toml");
    fs::write(&file_path, "[core]\nplugins = [\"focus\", \"wobbly\"]\n")?;
    assert!(ShellConfig::load(&file_path).is_err());

    let file_path = dir.path().join("bad_delay.toml");
    fs::write(&file_path, "[input]\nkb_repeat_delay = -5\n")?;
    assert!(ShellConfig::load(&file_path).is_err());

    let file_path = dir.path().join("bad_exit.toml");
    fs::write(&file_path, "[core]\nexit_binding = \"<hyper> KEY_X\"\n")?;
    assert!(ShellConfig::load(&file_path).is_err());

    let file_path = dir.path().join("broken.toml");
    fs::write(&file_path, "[input\nkb_repeat_rate = ")?;
    assert!(ShellConfig::load(&file_path).is_err());

    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let result = ShellConfig::load(dir.path().join("does_not_exist.toml"));
    assert!(result.is_err());
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = ShellConfig::default();
    config.input.kb_repeat_rate = 12;
    config.command.set("command_lock", "swaylock");
    config.command.set("always_binding_lock", "<super> KEY_L");
    config.save(&file_path)?;

    let loaded = ShellConfig::load(&file_path)?;
    assert_eq!(loaded, config);
    Ok(())
}

#[test]
fn test_binding_priority_repeatable_over_always_over_regular() {
    let mut command = CommandConfig::new();
    command.set("command_a", "run-a");
    command.set("binding_a", "<super> KEY_A");
    command.set("always_binding_a", "<super> KEY_B");
    command.set("repeatable_binding_a", "<super> KEY_C");

    command.set("command_b", "run-b");
    command.set("binding_b", "<super> KEY_D");
    command.set("always_binding_b", "<super> KEY_E");

    command.set("command_c", "run-c");
    command.set("binding_c", "BTN_LEFT");

    let bindings = command.bindings();
    assert_eq!(bindings.len(), 3);

    let a = bindings.iter().find(|b| b.name == "a").unwrap();
    assert_eq!(a.mode, BindingMode::Repeat);
    assert!(a.activator.matches(Modifiers::SUPER, Trigger::Key(46)));

    let b = bindings.iter().find(|b| b.name == "b").unwrap();
    assert_eq!(b.mode, BindingMode::Always);
    assert_eq!(b.command, "run-b");

    let c = bindings.iter().find(|b| b.name == "c").unwrap();
    assert_eq!(c.mode, BindingMode::Regular);
    assert!(c.activator.matches(Modifiers::NONE, Trigger::Button(0x110)));
}

#[test]
fn test_malformed_binding_falls_through_or_is_skipped() {
    let mut command = CommandConfig::new();
    command.set("command_a", "run-a");
    command.set("repeatable_binding_a", "<super> KEY_NOPE");
    command.set("binding_a", "<super> KEY_A");

    command.set("command_orphan", "run-orphan");
    command.set("binding_orphan", "none");

    // Binding options without a command are ignored
    command.set("binding_lonely", "<super> KEY_Z");

    let bindings = command.bindings();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].name, "a");
    assert_eq!(bindings[0].mode, BindingMode::Regular);
}
