//! Attaches a decorator to every view that should be decorated when it maps
//! or changes its preference.

use log::trace;

use crate::arbiter::{capabilities, ActivationFlags, Capabilities, VIEW_DECORATION};
use crate::compositor::{Core, Task};
use crate::signal::{channel, Scope, Signal};
use crate::types::{IdleHandle, SubscriptionId, ViewId};

use super::{Plugin, PluginHandle};

#[derive(Debug, Default)]
pub struct DecorationPlugin {
    subs: Vec<SubscriptionId>,
    idle_deactivate: Option<IdleHandle>,
}

impl DecorationPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_view_decoration(&mut self, core: &mut Core, me: PluginHandle, view: ViewId) {
        let Some(wanted) = core.view(view).map(|v| v.should_be_decorated()) else {
            return;
        };

        if !wanted {
            core.set_view_decorated(view, false);
            return;
        }

        if core.activate_plugin(me, ActivationFlags::NONE) {
            trace!("Decorating {}", view);
            core.set_view_decorated(view, true);
            if let Some(idle) = self.idle_deactivate {
                core.run_once(idle, Task::Deactivate);
            }
        }
    }
}

impl Plugin for DecorationPlugin {
    fn name(&self) -> &str {
        "decoration"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities(&[VIEW_DECORATION])
    }

    fn init(&mut self, core: &mut Core, me: PluginHandle) {
        self.idle_deactivate = Some(core.create_idle(me));
        for ch in [channel::MAP_VIEW, channel::DECORATION_STATE_UPDATED_VIEW] {
            self.subs.push(core.subscribe(me, Scope::Output(me.output), ch));
        }
    }

    fn fini(&mut self, core: &mut Core, me: PluginHandle) {
        for sub in self.subs.drain(..) {
            core.unsubscribe(sub);
        }
        if let Some(idle) = self.idle_deactivate.take() {
            core.destroy_idle(idle);
        }
        core.deactivate_plugin(me);

        let views: Vec<ViewId> = core
            .output(me.output)
            .map(|o| o.stack().render_order().to_vec())
            .unwrap_or_default();
        for view in views {
            core.set_view_decorated(view, false);
        }
    }

    fn on_signal(&mut self, core: &mut Core, me: PluginHandle, _sub: SubscriptionId, signal: &Signal) {
        if let Some(view) = signal.data.view() {
            self.update_view_decoration(core, me, view);
        }
    }

    fn on_task(&mut self, core: &mut Core, me: PluginHandle, _handle: IdleHandle, task: Task) {
        if task == Task::Deactivate {
            core.deactivate_plugin(me);
        }
    }
}
