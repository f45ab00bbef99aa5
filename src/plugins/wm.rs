//! Small window-management bindings: closing the focused view and leaving
//! the shell.

use log::{info, warn};

use crate::arbiter::{capabilities, ActivationFlags, Capabilities, GRAB_INPUT};
use crate::compositor::Core;
use crate::input::{ActivatorBinding, ActivatorSource};
use crate::types::BindingId;
use crate::view::ViewRole;

use super::{Plugin, PluginHandle};

fn bind(core: &mut Core, me: PluginHandle, text: &str) -> Option<BindingId> {
    match text.parse::<ActivatorBinding>() {
        Ok(activator) => core.add_binding(me, activator),
        Err(e) => {
            warn!("⚠️ Ignoring binding \"{}\": {}", text, e);
            None
        }
    }
}

/// Closes the focused toplevel on `[core] close_top_view`
#[derive(Debug, Default)]
pub struct ClosePlugin {
    binding: Option<BindingId>,
}

impl ClosePlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ClosePlugin {
    fn name(&self) -> &str {
        "close"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities(&[GRAB_INPUT])
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        let text = core.config().core.close_top_view.clone();
        self.binding = bind(core, me, &text);
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        if let Some(binding) = self.binding.take() {
            core.remove_binding(me, binding);
        }
    }

    fn on_activator(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        _binding: BindingId,
        _source: ActivatorSource,
        _code: u32,
    ) -> bool {
        if !core.activate_plugin(me, ActivationFlags::NONE) {
            return false;
        }
        core.deactivate_plugin(me);

        let focused = core.output(me.output).and_then(|o| o.focused_view());
        if let Some(view) = focused {
            if core.view(view).is_some_and(|v| v.role == ViewRole::Toplevel) {
                core.close_view(view);
            }
        }
        true
    }
}

/// Terminates the shell on `[core] exit_binding` unless the output is
/// inhibited
#[derive(Debug, Default)]
pub struct ExitPlugin {
    binding: Option<BindingId>,
}

impl ExitPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ExitPlugin {
    fn name(&self) -> &str {
        "exit"
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        let text = core.config().core.exit_binding.clone();
        self.binding = bind(core, me, &text);
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        if let Some(binding) = self.binding.take() {
            core.remove_binding(me, binding);
        }
    }

    fn on_activator(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        _binding: BindingId,
        _source: ActivatorSource,
        _code: u32,
    ) -> bool {
        if core.output(me.output).is_some_and(|o| o.is_inhibited()) {
            return false;
        }

        info!("👋 Exit binding pressed");
        core.terminate();
        true
    }
}
