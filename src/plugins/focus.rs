//! Focus routing
//!
//! [`FocusPlugin`] turns clicks, touches and client focus requests into
//! output focus. Focus always lands on the root of a view group; keeping the
//! group's children above their root is [`FocusParentPlugin`]'s job, which
//! does it one idle turn later so other `focus-view` handlers see a stable
//! state first.

use log::{debug, trace};

use crate::arbiter::{capabilities, ActivationFlags, Capabilities, MANAGE_DESKTOP};
use crate::compositor::{Core, Task};
use crate::input::keycodes::BTN_LEFT;
use crate::input::{ActivatorBinding, ActivatorSource, Trigger};
use crate::signal::{channel, Scope, Signal, SignalData};
use crate::types::{BindingId, IdleHandle, SubscriptionId, SurfaceId, ViewId};

use super::{Plugin, PluginHandle};

/// The last view this plugin focused, with the guards keeping it valid
#[derive(Debug, Clone, Copy)]
struct LastFocus {
    view: ViewId,
    disappeared: SubscriptionId,
    set_output: SubscriptionId,
}

#[derive(Debug, Default)]
pub struct FocusPlugin {
    button: Option<BindingId>,
    touch: Option<SubscriptionId>,
    request: Option<SubscriptionId>,
    last_focus: Option<LastFocus>,
}

impl FocusPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The view focused by the last successful focus change, if it is still
    /// around
    pub fn last_focus(&self) -> Option<ViewId> {
        self.last_focus.map(|l| l.view)
    }

    fn check_focus_surface(&mut self, core: &mut Core, me: PluginHandle, surface: Option<SurfaceId>) {
        let view = surface.and_then(|s| core.surfaces().owning_view(s));
        let root = view.and_then(|v| core.views().root_of(v));

        // Popups of the previous group go away before anything else changes
        if self.last_focus() != root {
            self.send_done(core, me);
        }

        let Some((view, root)) = view.zip(root) else {
            return;
        };
        let focusable = core
            .view(view)
            .is_some_and(|v| v.mapped && v.keyboard_focusable);
        if !focusable || !core.activate_plugin(me, ActivationFlags::NONE) {
            trace!("Focus on {} refused", view);
            return;
        }
        core.deactivate_plugin(me);

        let Some(output) = core.view(root).and_then(|v| v.output) else {
            return;
        };
        core.focus_view(output, Some(root));
        // A focus-view handler may have unmapped the root already
        let still_mapped = core.views().is_mapped(root);
        self.set_last_focus(core, me, still_mapped.then_some(root));
    }

    /// Dismiss every popup of the last focused group and forget it
    fn send_done(&mut self, core: &mut Core, me: PluginHandle) {
        if let Some(last) = self.last_focus {
            core.dismiss_popups(last.view);
            self.set_last_focus(core, me, None);
        }
    }

    fn set_last_focus(&mut self, core: &mut Core, me: PluginHandle, view: Option<ViewId>) {
        if self.last_focus() == view {
            return;
        }

        if let Some(last) = self.last_focus.take() {
            core.unsubscribe(last.disappeared);
            core.unsubscribe(last.set_output);
        }

        self.last_focus = view.map(|view| LastFocus {
            view,
            disappeared: core.subscribe(me, Scope::View(view), channel::DISAPPEARED),
            set_output: core.subscribe(me, Scope::View(view), channel::SET_OUTPUT),
        });
    }
}

impl Plugin for FocusPlugin {
    fn name(&self) -> &str {
        "focus"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities(&[MANAGE_DESKTOP])
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        self.button = core.add_binding(me, ActivatorBinding::single(Trigger::Button(BTN_LEFT)));
        self.touch = Some(core.subscribe(me, Scope::Global, channel::TOUCH_DOWN));
        self.request = Some(core.subscribe(me, Scope::Output(me.output), channel::WM_FOCUS_REQUEST));
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        if let Some(binding) = self.button.take() {
            core.remove_binding(me, binding);
        }
        for sub in [self.touch.take(), self.request.take()].into_iter().flatten() {
            core.unsubscribe(sub);
        }
        self.set_last_focus(core, me, None);
    }

    fn on_signal(&mut self, core: &mut Core, me: PluginHandle, sub: SubscriptionId, signal: &Signal) {
        match (&signal.data, self.last_focus) {
            (SignalData::FocusRequest(surface), _) if signal.is(channel::WM_FOCUS_REQUEST) => {
                self.check_focus_surface(core, me, Some(*surface));
            }
            (SignalData::Touch(event), _) if signal.is(channel::TOUCH_DOWN) => {
                if event.output == me.output {
                    let focus = core.input().touch_focus();
                    self.check_focus_surface(core, me, focus);
                }
            }
            (_, Some(last)) if sub == last.disappeared => {
                self.set_last_focus(core, me, None);
            }
            (SignalData::ViewOutput { new, .. }, Some(last)) if sub == last.set_output => {
                if *new != Some(me.output) {
                    self.send_done(core, me);
                }
            }
            _ => {}
        }
    }

    fn on_activator(
        &mut self,
        core: &mut Core,
        me: PluginHandle,
        _binding: BindingId,
        source: ActivatorSource,
        _code: u32,
    ) -> bool {
        if source != ActivatorSource::Buttonbinding {
            return false;
        }
        let focus = core.input().cursor_focus();
        self.check_focus_surface(core, me, focus);
        // Clicks still reach the client
        false
    }
}

/// An in-flight deferred focus
#[derive(Debug, Clone, Copy)]
struct PendingFocus {
    view: ViewId,
    unmap_guard: SubscriptionId,
}

#[derive(Debug, Default)]
pub struct FocusParentPlugin {
    focus_view: Option<SubscriptionId>,
    idle: Option<IdleHandle>,
    pending: Option<PendingFocus>,
}

impl FocusParentPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_focus_view(&mut self, core: &mut Core, me: PluginHandle, view: ViewId) {
        let Some(root) = core.views().root_of(view) else {
            return;
        };
        let Some(front) = core.views().enumerate_mapped(root).first().copied() else {
            return;
        };
        if front == view {
            return;
        }
        let Some(idle) = self.idle else {
            return;
        };

        debug!("Front-most of group {} is {}, focused {}", root, front, view);
        self.drop_pending(core);
        self.pending = Some(PendingFocus {
            view,
            unmap_guard: core.subscribe(me, Scope::View(view), channel::UNMAP),
        });
        core.mark_focus_pending(me.output, view);
        core.run_once(idle, Task::FocusGroup { view });
    }

    /// Restack `view`'s mapped subtree above it and focus the front-most
    fn apply(&mut self, core: &mut Core, me: PluginHandle, view: ViewId) {
        let views = core.views().enumerate_mapped(view);
        for &child in views.iter().filter(|v| **v != view) {
            core.restack_above(me.output, child, view);
        }

        if let Some(sub) = self.focus_view.take() {
            core.unsubscribe(sub);
        }
        if let Some(&front) = views.first() {
            core.focus_view(me.output, Some(front));
        }
        self.focus_view = Some(core.subscribe(me, Scope::Output(me.output), channel::FOCUS_VIEW));

        self.drop_pending(core);
        core.clear_focus_pending(me.output);
    }

    fn drop_pending(&mut self, core: &mut Core) {
        if let Some(pending) = self.pending.take() {
            core.unsubscribe(pending.unmap_guard);
        }
    }
}

impl Plugin for FocusParentPlugin {
    fn name(&self) -> &str {
        "focus-parent"
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        self.focus_view = Some(core.subscribe(me, Scope::Output(me.output), channel::FOCUS_VIEW));
        self.idle = Some(core.create_idle(me));
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        if let Some(sub) = self.focus_view.take() {
            core.unsubscribe(sub);
        }
        if let Some(idle) = self.idle.take() {
            core.destroy_idle(idle);
        }
        if self.pending.is_some() {
            self.drop_pending(core);
            core.clear_focus_pending(me.output);
        }
    }

    fn on_signal(&mut self, core: &mut Core, me: PluginHandle, sub: SubscriptionId, signal: &Signal) {
        if Some(sub) == self.focus_view {
            if let SignalData::Focus(Some(view)) = signal.data {
                self.on_focus_view(core, me, view);
            }
            return;
        }

        if self.pending.is_some_and(|p| p.unmap_guard == sub) {
            // The view went away before the deferred focus ran
            if let Some(idle) = self.idle {
                core.cancel_idle(idle);
            }
            self.drop_pending(core);
            core.clear_focus_pending(me.output);
        }
    }

    fn on_task(&mut self, core: &mut Core, me: PluginHandle, _handle: IdleHandle, task: Task) {
        if let Task::FocusGroup { view } = task {
            if self.pending.is_some_and(|p| p.view == view) {
                self.apply(core, me, view);
            }
        }
    }
}
