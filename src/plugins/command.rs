//! Command bindings
//!
//! Binds configured commands to activators. Three flavours exist:
//!
//! 1. Regular bindings run the command once.
//! 2. Repeatable bindings (`repeatable_binding_<name>`) run it once, then,
//!    after `kb_repeat_delay` ms, `kb_repeat_rate` times per second until the
//!    key or button is released.
//! 3. Always bindings (`always_binding_<name>`) run even while the output is
//!    inhibited, e.g. behind a lock screen.
//!
//! While a repeat is in progress every other binding of this plugin is
//! refused.

use log::{debug, trace, warn};

use crate::arbiter::{capabilities, ActivationFlags, Capabilities, GRAB_INPUT};
use crate::compositor::Core;
use crate::config::{BindingMode, CommandBinding};
use crate::input::{ActivatorSource, PressState, Trigger};
use crate::signal::{channel, Scope, Signal, SignalData};
use crate::types::{BindingId, SubscriptionId, TimerId};

use super::{Plugin, PluginHandle};

/// A held repeatable binding
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeldBinding {
    /// Key or button whose release ends the repeat
    trigger: Trigger,
    command: String,
    timer: TimerId,
    key_sub: SubscriptionId,
    button_sub: SubscriptionId,
}

/// Press/hold/release lifecycle of a repeatable binding
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum RepeatState {
    #[default]
    Idle,
    /// Waiting for the initial delay to pass
    Armed(HeldBinding),
    /// Re-running the command on every tick
    Repeating(HeldBinding),
}

#[derive(Debug, Default)]
pub struct CommandPlugin {
    bindings: Vec<(BindingId, CommandBinding)>,
    reload: Option<SubscriptionId>,
    repeat: RepeatState,
}

impl CommandPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn setup_bindings(&mut self, core: &mut Core, me: PluginHandle) {
        for binding in core.config().command.bindings() {
            match core.add_binding(me, binding.activator.clone()) {
                Some(id) => {
                    debug!("⌨️ {} -> `{}` ({:?})", binding.activator, binding.command, binding.mode);
                    self.bindings.push((id, binding));
                }
                None => warn!("⚠️ Could not bind command `{}`", binding.name),
            }
        }
    }

    fn clear_bindings(&mut self, core: &mut Core, me: PluginHandle) {
        for (id, _) in self.bindings.drain(..) {
            core.remove_binding(me, id);
        }
    }

    fn held(&self) -> Option<&HeldBinding> {
        match &self.repeat {
            RepeatState::Idle => None,
            RepeatState::Armed(held) | RepeatState::Repeating(held) => Some(held),
        }
    }

    fn on_binding(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        binding: BindingId,
        source: ActivatorSource,
        code: u32,
    ) -> bool {
        if self.repeat != RepeatState::Idle {
            trace!("Repeat in progress, refusing {}", binding);
            return false;
        }

        let Some((command, mode)) = self
            .bindings
            .iter()
            .find(|(id, _)| *id == binding)
            .map(|(_, b)| (b.command.clone(), b.mode))
        else {
            return false;
        };

        let flags = match mode {
            BindingMode::Always => ActivationFlags::IGNORE_INHIBIT,
            _ => ActivationFlags::NONE,
        };
        if !core.activate_plugin(me, flags) {
            return false;
        }

        core.run_command(&command);

        if mode != BindingMode::Repeat || code == 0 {
            core.deactivate_plugin(me);
            return true;
        }

        let trigger = match source {
            ActivatorSource::Keybinding => Trigger::Key(code),
            ActivatorSource::Buttonbinding => Trigger::Button(code),
        };
        let delay = u64::try_from(core.config().input.kb_repeat_delay).unwrap_or(0);
        let timer = core.add_timer(me);
        core.arm_timer(timer, delay);

        self.repeat = RepeatState::Armed(HeldBinding {
            trigger,
            command,
            timer,
            key_sub: core.subscribe(me, Scope::Global, channel::KEYBOARD_KEY),
            button_sub: core.subscribe(me, Scope::Global, channel::POINTER_BUTTON),
        });
        true
    }

    /// One repeat tick: validate the rate, re-arm, run
    fn repeat_once(&mut self, core: &mut Core, me: PluginHandle) {
        let rate = core.config().input.kb_repeat_rate;
        if rate <= 0 || rate > 1000 {
            debug!("Repeat rate {} out of range, stopping", rate);
            self.reset_repeat(core, me);
            return;
        }

        let Some(held) = self.held() else {
            return;
        };
        let (timer, command) = (held.timer, held.command.clone());
        core.arm_timer(timer, 1000 / rate as u64);
        core.run_command(&command);
    }

    fn reset_repeat(&mut self, core: &mut Core, me: PluginHandle) {
        let (RepeatState::Armed(held) | RepeatState::Repeating(held)) = std::mem::take(&mut self.repeat)
        else {
            return;
        };

        core.remove_timer(held.timer);
        core.deactivate_plugin(me);
        core.unsubscribe(held.key_sub);
        core.unsubscribe(held.button_sub);
        trace!("Repeat of `{}` stopped", held.command);
    }

    fn released(&self, trigger: Trigger) -> bool {
        self.held().is_some_and(|held| held.trigger == trigger)
    }
}

impl Plugin for CommandPlugin {
    fn name(&self) -> &str {
        "command"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities(&[GRAB_INPUT])
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        self.setup_bindings(core, me);
        self.reload = Some(core.subscribe(me, Scope::Global, channel::RELOAD_CONFIG));
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        self.reset_repeat(core, me);
        if let Some(sub) = self.reload.take() {
            core.unsubscribe(sub);
        }
        self.clear_bindings(core, me);
    }

    fn on_signal(&mut self, core: &mut Core, me: PluginHandle, sub: SubscriptionId, signal: &Signal) {
        if Some(sub) == self.reload {
            self.reset_repeat(core, me);
            self.clear_bindings(core, me);
            self.setup_bindings(core, me);
            return;
        }

        let released = match signal.data {
            SignalData::Key(event) if event.state == PressState::Released => {
                self.released(Trigger::Key(event.code))
            }
            SignalData::Button(event) if event.state == PressState::Released => {
                self.released(Trigger::Button(event.code))
            }
            _ => false,
        };
        if released {
            self.reset_repeat(core, me);
        }
    }

    fn on_timer(&mut self, core: &mut Core, me: PluginHandle, timer: TimerId) {
        match std::mem::take(&mut self.repeat) {
            RepeatState::Armed(held) | RepeatState::Repeating(held) if held.timer == timer => {
                self.repeat = RepeatState::Repeating(held);
                self.repeat_once(core, me);
            }
            other => self.repeat = other,
        }
    }

    fn on_activator(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        binding: BindingId,
        source: ActivatorSource,
        code: u32,
    ) -> bool {
        self.on_binding(core, me, binding, source, code)
    }
}
