//! Configuration management for Axiom Shell
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. The core only ever reads these values; plugins pick them
//! up again when `reload-config` is published.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::input::ActivatorBinding;
use crate::plugins;

/// Main configuration struct containing all shell settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShellConfig {
    /// Plugin list and built-in bindings
    #[serde(default)]
    pub core: CoreConfig,

    /// Keyboard repeat settings
    #[serde(default)]
    pub input: InputConfig,

    /// Command bindings (`command_<name>` plus its binding options)
    #[serde(default)]
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Plugins loaded on every output, in load order
    pub plugins: Vec<String>,

    /// Activator closing the focused toplevel
    pub close_top_view: String,

    /// Activator shutting the shell down
    pub exit_binding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Delay before a held binding starts repeating (ms)
    pub kb_repeat_delay: i32,

    /// Repeats per second once repeating
    pub kb_repeat_rate: i32,
}

/// The raw `[command]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct CommandConfig {
    options: BTreeMap<String, String>,
}

/// How a command binding behaves once triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Run once
    Regular,
    /// Run once, then repeat while held
    Repeat,
    /// Run once, even while the output is inhibited
    Always,
}

/// A command together with the activator that runs it
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBinding {
    pub name: String,
    pub command: String,
    pub mode: BindingMode,
    pub activator: ActivatorBinding,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            plugins: plugins::BUILTIN.iter().map(|name| name.to_string()).collect(),
            close_top_view: "<super> KEY_Q | <alt> KEY_F4".to_string(),
            exit_binding: "<ctrl> <alt> KEY_BACKSPACE".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            kb_repeat_delay: 400,
            kb_repeat_rate: 40,
        }
    }
}

const COMMAND_PREFIX: &str = "command_";

impl CommandConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.options.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Resolve every `command_<name>` entry to its binding.
    ///
    /// `repeatable_binding_<name>` wins over `always_binding_<name>`, which
    /// wins over `binding_<name>`. An option that fails to parse is treated
    /// as absent. Commands without any usable binding are skipped.
    pub fn bindings(&self) -> Vec<CommandBinding> {
        let mut out = Vec::new();

        for (key, command) in &self.options {
            let Some(name) = key.strip_prefix(COMMAND_PREFIX) else {
                continue;
            };

            let candidates = [
                (format!("repeatable_binding_{}", name), BindingMode::Repeat),
                (format!("always_binding_{}", name), BindingMode::Always),
                (format!("binding_{}", name), BindingMode::Regular),
            ];

            let resolved = candidates
                .iter()
                .find_map(|(option, mode)| self.activator(option).map(|a| (*mode, a)));

            match resolved {
                Some((mode, activator)) => out.push(CommandBinding {
                    name: name.to_string(),
                    command: command.clone(),
                    mode,
                    activator,
                }),
                None => warn!("⚠️ Command `{}` has no usable binding, skipping", name),
            }
        }

        out
    }

    fn activator(&self, option: &str) -> Option<ActivatorBinding> {
        let value = self.options.get(option)?;
        match value.parse::<ActivatorBinding>() {
            Ok(activator) => Some(activator),
            Err(e) => {
                warn!("⚠️ Ignoring [command] {} = \"{}\": {}", option, value, e);
                None
            }
        }
    }
}

impl ShellConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: ShellConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for name in &self.core.plugins {
            if !plugins::is_builtin(name) {
                anyhow::bail!("Unknown plugin: {}", name);
            }
        }

        if self.input.kb_repeat_delay < 0 {
            anyhow::bail!("Invalid kb_repeat_delay: must not be negative");
        }

        self.core
            .close_top_view
            .parse::<ActivatorBinding>()
            .with_context(|| format!("Invalid close_top_view: {}", self.core.close_top_view))?;
        self.core
            .exit_binding
            .parse::<ActivatorBinding>()
            .with_context(|| format!("Invalid exit_binding: {}", self.core.exit_binding))?;

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
