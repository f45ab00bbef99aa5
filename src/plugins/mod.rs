//! Plugins
//!
//! A plugin is loaded once per output. The core calls back into it with
//! explicit messages: signals it subscribed to, idle tasks and timers it
//! scheduled, and bindings it registered. Every callback receives the core
//! and the plugin's own [`PluginHandle`]; plugins keep only ids between
//! callbacks.
//!
//! Built-in plugins:
//! - `focus`: click/touch/request to focus, popup dismissal
//! - `focus-parent`: keeps a focused group's children above it
//! - `command`: configured command bindings with key repeat
//! - `close`: closes the focused toplevel
//! - `exit`: shuts the shell down
//! - `decoration`: attaches decorators to views that want them

pub mod command;
pub mod decoration;
pub mod focus;
pub mod wm;

use crate::arbiter::Capabilities;
use crate::compositor::{Core, Task};
use crate::input::ActivatorSource;
use crate::signal::Signal;
use crate::types::{BindingId, IdleHandle, OutputId, PluginId, SubscriptionId, TimerId};

pub use command::CommandPlugin;
pub use decoration::DecorationPlugin;
pub use focus::{FocusParentPlugin, FocusPlugin};
pub use wm::{ClosePlugin, ExitPlugin};

/// Names accepted in `[core] plugins`
pub const BUILTIN: &[&str] = &["focus", "focus-parent", "command", "close", "exit", "decoration"];

/// Identity a plugin acts under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginHandle {
    pub id: PluginId,
    pub output: OutputId,
}

pub trait Plugin {
    fn name(&self) -> &str;

    /// Capability tokens requested on every activation
    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle);

    /// Release everything acquired since `init`. Whatever is left afterwards
    /// is swept by the core and reported as leaked.
    fn fini(&mut self, _core: &mut Core, _me: PluginHandle) {}

    fn on_signal(&mut self, _core: &mut Core, _me: PluginHandle, _sub: SubscriptionId, _signal: &Signal) {}

    fn on_task(&mut self, _core: &mut Core, _me: PluginHandle, _handle: IdleHandle, _task: Task) {}

    fn on_timer(&mut self, _core: &mut Core, _me: PluginHandle, _timer: TimerId) {}

    /// A registered binding fired. `code` is the key or button that
    /// triggered it. Returns whether the event was taken.
    fn on_activator(
        &mut self,
        _core: &mut Core,
        _me: PluginHandle,
        _binding: BindingId,
        _source: ActivatorSource,
        _code: u32,
    ) -> bool {
        false
    }
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN.contains(&name)
}

/// Instantiate a built-in plugin by name
pub fn create(name: &str) -> Option<Box<dyn Plugin>> {
    let plugin: Box<dyn Plugin> = match name {
        "focus" => Box::new(FocusPlugin::new()),
        "focus-parent" => Box::new(FocusParentPlugin::new()),
        "command" => Box::new(CommandPlugin::new()),
        "close" => Box::new(ClosePlugin::new()),
        "exit" => Box::new(ExitPlugin::new()),
        "decoration" => Box::new(DecorationPlugin::new()),
        _ => return None,
    };
    Some(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_can_be_created() {
        for name in BUILTIN {
            let plugin = create(name).unwrap();
            assert_eq!(plugin.name(), *name);
        }
        assert!(create("wobbly").is_none());
        assert!(!is_builtin("wobbly"));
    }
}
