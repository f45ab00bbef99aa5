//! The shell core
//!
//! [`Core`] owns every piece of state: outputs, the view and surface trees,
//! seat state, the signal bus, the idle scheduler, timers and the loaded
//! plugins. Everything runs on one thread. External events enter through the
//! `handle_*` and lifecycle methods; once such a call has done its work the
//! core drains pending idle tasks, so deferred work always runs before the
//! next external event.
//!
//! Plugins never hold references into the core. They get `&mut Core` for the
//! duration of a callback and refer to everything else by id.

use log::{debug, info, trace, warn};
use std::collections::BTreeMap;

use crate::arbiter::{ActivationFlags, Capabilities};
use crate::backend::ShellBackend;
use crate::config::ShellConfig;
use crate::input::{
    ActivatorBinding, ActivatorSource, ButtonEvent, InputState, KeyEvent, PressState, TouchEvent,
    Trigger,
};
use crate::output::{Binding, Output};
use crate::plugins::{self, Plugin, PluginHandle};
use crate::scheduler::{Scheduler, Timers};
use crate::signal::{channel, Scope, Signal, SignalBus, SignalData};
use crate::surface::{ChildKind, SurfaceTree};
use crate::types::{
    BindingId, IdAllocator, IdleHandle, OutputId, PluginId, Point, Rectangle, SubscriptionId,
    SurfaceId, TimerId, ViewId,
};
use crate::view::{View, ViewRole, ViewTree};

/// Upper bound on idle turns drained after one external event
const MAX_IDLE_TURNS: usize = 64;

/// Deferred work a plugin schedules on one of its idle handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Restack `view`'s mapped group above it and focus the front-most view
    FocusGroup { view: ViewId },
    /// Release the owner's activation
    Deactivate,
    /// Opaque payload for plugins living outside this crate
    User(u64),
}

struct PluginSlot {
    name: String,
    output: OutputId,
    capabilities: Capabilities,
    /// Empty while the plugin is running a callback
    plugin: Option<Box<dyn Plugin>>,
    unload_requested: bool,
}

/// Resources swept from a plugin that did not release them in `fini`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Leaks {
    pub activations: usize,
    pub subscriptions: usize,
    pub idle_handles: usize,
    pub timers: usize,
    pub bindings: usize,
}

impl Leaks {
    pub fn total(&self) -> usize {
        self.activations + self.subscriptions + self.idle_handles + self.timers + self.bindings
    }
}

pub struct Core {
    config: ShellConfig,
    backend: Box<dyn ShellBackend>,

    outputs: BTreeMap<OutputId, Output>,
    output_ids: IdAllocator,
    views: ViewTree,
    surfaces: SurfaceTree,
    input: InputState,

    bus: SignalBus,
    scheduler: Scheduler<Task>,
    timers: Timers,

    plugins: BTreeMap<PluginId, PluginSlot>,
    plugin_ids: IdAllocator,
    binding_ids: IdAllocator,

    /// Number of plugin callbacks currently on the stack
    depth: usize,
    running: bool,
}

impl Core {
    pub fn new(config: ShellConfig, backend: Box<dyn ShellBackend>) -> Self {
        Self {
            config,
            backend,
            outputs: BTreeMap::new(),
            output_ids: IdAllocator::new(),
            views: ViewTree::new(),
            surfaces: SurfaceTree::new(),
            input: InputState::new(),
            bus: SignalBus::new(),
            scheduler: Scheduler::new(),
            timers: Timers::new(),
            plugins: BTreeMap::new(),
            plugin_ids: IdAllocator::new(),
            binding_ids: IdAllocator::new(),
            depth: 0,
            running: true,
        }
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    pub fn views(&self) -> &ViewTree {
        &self.views
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(id)
    }

    pub fn surfaces(&self) -> &SurfaceTree {
        &self.surfaces
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Current logical time in milliseconds
    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_pending_idle(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn is_idle_pending(&self, handle: IdleHandle) -> bool {
        self.scheduler.is_pending(handle)
    }

    pub fn plugin_name(&self, id: PluginId) -> Option<&str> {
        self.plugins.get(&id).map(|slot| slot.name.as_str())
    }

    /// Loaded plugins on `output`, in load order
    pub fn plugins_on(&self, output: OutputId) -> Vec<PluginId> {
        self.plugins
            .iter()
            .filter(|(_, slot)| slot.output == output)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Plugin on `output` loaded under `name`
    pub fn find_plugin(&self, output: OutputId, name: &str) -> Option<PluginId> {
        self.plugins
            .iter()
            .find(|(_, slot)| slot.output == output && slot.name == name)
            .map(|(id, _)| *id)
    }

    // ---------------------------------------------------------------------
    // Outputs
    // ---------------------------------------------------------------------

    /// Track a new output. Plugins are loaded separately.
    pub fn add_output(&mut self, name: &str, geometry: Rectangle) -> OutputId {
        let id = OutputId(self.output_ids.next());
        info!("🖥️ Output {} ({}) added at {:?}", id, name, geometry);
        self.outputs.insert(id, Output::new(id, name, geometry));
        id
    }

    /// Unload the output's plugins, move its views off it and forget it
    pub fn remove_output(&mut self, id: OutputId) -> bool {
        if !self.outputs.contains_key(&id) {
            return false;
        }

        for plugin in self.plugins_on(id).into_iter().rev() {
            self.unload_plugin(plugin);
        }

        let views: Vec<ViewId> = self
            .views
            .iter()
            .filter(|v| v.output == Some(id))
            .map(|v| v.id)
            .collect();
        for view in views {
            self.set_view_output(view, None);
        }

        let revoked = self.bus.revoke_scope(Scope::Output(id));
        if revoked > 0 {
            debug!("Revoked {} subscription(s) on removed {}", revoked, id);
        }
        self.outputs.remove(&id);
        info!("🖥️ Output {} removed", id);
        self.flush();
        true
    }

    // ---------------------------------------------------------------------
    // Plugins
    // ---------------------------------------------------------------------

    /// Load every plugin named in `[core] plugins` on `output`
    pub fn load_configured_plugins(&mut self, output: OutputId) -> Vec<PluginId> {
        let names = self.config.core.plugins.clone();
        let mut loaded = Vec::new();
        for name in names {
            match plugins::create(&name) {
                Some(plugin) => {
                    if let Some(id) = self.load_plugin(output, plugin) {
                        loaded.push(id);
                    }
                }
                None => warn!("⚠️ Unknown plugin `{}`, skipping", name),
            }
        }
        loaded
    }

    /// Load a plugin instance on `output` and run its `init`
    pub fn load_plugin(&mut self, output: OutputId, plugin: Box<dyn Plugin>) -> Option<PluginId> {
        if !self.outputs.contains_key(&output) {
            warn!("⚠️ Cannot load `{}` on unknown {}", plugin.name(), output);
            return None;
        }

        let id = PluginId(self.plugin_ids.next());
        debug!("🔌 Loading plugin `{}` as {} on {}", plugin.name(), id, output);
        self.plugins.insert(
            id,
            PluginSlot {
                name: plugin.name().to_string(),
                output,
                capabilities: plugin.capabilities(),
                plugin: Some(plugin),
                unload_requested: false,
            },
        );

        self.with_plugin(id, |plugin, core, me| plugin.init(core, me));
        self.flush();
        Some(id)
    }

    /// Run the plugin's `fini`, then sweep whatever it left behind.
    ///
    /// Returns what had to be swept, or `None` for an unknown plugin. A
    /// plugin unloading itself from inside a callback is unloaded once the
    /// callback returns.
    pub fn unload_plugin(&mut self, id: PluginId) -> Option<Leaks> {
        let slot = self.plugins.get_mut(&id)?;
        if slot.plugin.is_none() {
            debug!("{} is busy, unloading after its callback", id);
            slot.unload_requested = true;
            return Some(Leaks::default());
        }

        self.with_plugin(id, |plugin, core, me| plugin.fini(core, me));
        let slot = self.plugins.remove(&id)?;

        let leaks = Leaks {
            activations: self
                .outputs
                .get_mut(&slot.output)
                .map_or(0, |o| usize::from(o.arbiter.deactivate(id))),
            subscriptions: self.bus.revoke_owner(id),
            idle_handles: self.scheduler.destroy_owner(id),
            timers: self.timers.remove_owner(id),
            bindings: self
                .outputs
                .get_mut(&slot.output)
                .map_or(0, |o| o.remove_owner_bindings(id)),
        };

        for (kind, count) in [
            ("activation", leaks.activations),
            ("subscription", leaks.subscriptions),
            ("idle handle", leaks.idle_handles),
            ("timer", leaks.timers),
            ("binding", leaks.bindings),
        ] {
            if count > 0 {
                warn!("⚠️ Plugin `{}` leaked {} {}(s)", slot.name, count, kind);
            }
        }

        debug!("🔌 Unloaded plugin `{}` ({})", slot.name, id);
        self.flush();
        Some(leaks)
    }

    /// Run `f` with the plugin taken out of its slot.
    ///
    /// Returns `None` when the plugin is unknown or already running a
    /// callback further up the stack; handlers are never re-entered.
    fn with_plugin<R>(
        &mut self,
        id: PluginId,
        f: impl FnOnce(&mut dyn Plugin, &mut Core, PluginHandle) -> R,
    ) -> Option<R> {
        let slot = self.plugins.get_mut(&id)?;
        let Some(mut plugin) = slot.plugin.take() else {
            trace!("{} is already running a callback, skipping nested delivery", id);
            return None;
        };
        let me = PluginHandle {
            id,
            output: slot.output,
        };

        self.depth += 1;
        let result = f(plugin.as_mut(), self, me);
        self.depth -= 1;

        let unload = match self.plugins.get_mut(&id) {
            Some(slot) => {
                slot.plugin = Some(plugin);
                std::mem::take(&mut slot.unload_requested)
            }
            None => false,
        };
        if unload {
            self.unload_plugin(id);
        }

        Some(result)
    }

    // ---------------------------------------------------------------------
    // Signal bus
    // ---------------------------------------------------------------------

    pub fn subscribe(&mut self, me: PluginHandle, scope: Scope, channel: &str) -> SubscriptionId {
        self.bus.subscribe(scope, channel, me.id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Deliver a signal synchronously to every current subscriber.
    ///
    /// The subscriber list is snapshotted first: handlers added during the
    /// pass are not called, handlers removed during it are skipped.
    pub fn publish(&mut self, scope: Scope, channel: &str, data: SignalData) {
        let subscribers = self.bus.snapshot(scope, channel);
        if subscribers.is_empty() {
            return;
        }

        let signal = Signal::new(scope, channel, data);
        trace!("Publishing {} on {:?} to {} handler(s)", channel, scope, subscribers.len());
        for (sub, owner) in subscribers {
            if !self.bus.is_subscribed(sub) {
                continue;
            }
            self.with_plugin(owner, |plugin, core, me| plugin.on_signal(core, me, sub, &signal));
        }
    }

    // ---------------------------------------------------------------------
    // Activation
    // ---------------------------------------------------------------------

    /// Try to acquire the plugin's declared capabilities on its output
    pub fn activate_plugin(&mut self, me: PluginHandle, flags: ActivationFlags) -> bool {
        let Some(capabilities) = self.plugins.get(&me.id).map(|slot| slot.capabilities.clone())
        else {
            return false;
        };
        let Some(output) = self.outputs.get_mut(&me.output) else {
            return false;
        };

        let was_active = output.arbiter.is_active(me.id);
        if !output.arbiter.activate(me.id, &capabilities, flags) {
            return false;
        }

        if !was_active {
            trace!("{} activated on {}", me.id, me.output);
            self.publish(
                Scope::Output(me.output),
                channel::PLUGIN_ACTIVATION_CHANGED,
                SignalData::Activation {
                    plugin: me.id,
                    active: true,
                },
            );
        }
        true
    }

    /// Release everything the plugin holds on its output. Safe to call when
    /// nothing is held.
    pub fn deactivate_plugin(&mut self, me: PluginHandle) -> bool {
        let released = self
            .outputs
            .get_mut(&me.output)
            .is_some_and(|o| o.arbiter.deactivate(me.id));

        if released {
            trace!("{} deactivated on {}", me.id, me.output);
            self.publish(
                Scope::Output(me.output),
                channel::PLUGIN_ACTIVATION_CHANGED,
                SignalData::Activation {
                    plugin: me.id,
                    active: false,
                },
            );
        }
        released
    }

    /// Block (or unblock) activations without `ignore_inhibit`, as a lock
    /// screen does
    pub fn set_inhibited(&mut self, output: OutputId, inhibited: bool) -> bool {
        match self.outputs.get_mut(&output) {
            Some(o) => {
                o.arbiter.set_inhibited(inhibited);
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Deferred execution and timers
    // ---------------------------------------------------------------------

    pub fn create_idle(&mut self, me: PluginHandle) -> IdleHandle {
        self.scheduler.create_handle(me.id)
    }

    /// Schedule `task` on `handle`, replacing any pending task there
    pub fn run_once(&mut self, handle: IdleHandle, task: Task) -> bool {
        self.scheduler.run_once(handle, task)
    }

    pub fn cancel_idle(&mut self, handle: IdleHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    pub fn destroy_idle(&mut self, handle: IdleHandle) -> bool {
        self.scheduler.destroy_handle(handle)
    }

    /// Run pending idle tasks turn by turn until none are left.
    ///
    /// Tasks scheduled while a turn runs wait for the next turn. Returns the
    /// number of tasks run.
    pub fn dispatch_idle(&mut self) -> usize {
        if self.depth > 0 {
            return 0;
        }

        let mut ran = 0;
        for _ in 0..MAX_IDLE_TURNS {
            let marker = self.scheduler.turn_marker();
            let mut ran_this_turn = 0;
            while let Some((handle, owner, task)) = self.scheduler.pop_before(marker) {
                ran_this_turn += 1;
                self.with_plugin(owner, |plugin, core, me| plugin.on_task(core, me, handle, task));
            }

            if ran_this_turn == 0 {
                return ran;
            }
            ran += ran_this_turn;
        }

        if self.scheduler.has_pending() {
            warn!("⚠️ Idle tasks still pending after {} turns", MAX_IDLE_TURNS);
        }
        ran
    }

    /// Drain idle work unless we are inside a plugin callback
    fn flush(&mut self) {
        if self.depth == 0 {
            self.dispatch_idle();
        }
    }

    pub fn add_timer(&mut self, me: PluginHandle) -> TimerId {
        self.timers.add(me.id)
    }

    /// (Re)arm a timer to fire `delay_ms` from now
    pub fn arm_timer(&mut self, timer: TimerId, delay_ms: u64) -> bool {
        self.timers.arm(timer, delay_ms)
    }

    pub fn disarm_timer(&mut self, timer: TimerId) -> bool {
        self.timers.disarm(timer)
    }

    pub fn remove_timer(&mut self, timer: TimerId) -> bool {
        self.timers.remove(timer)
    }

    pub fn is_timer_armed(&self, timer: TimerId) -> bool {
        self.timers.is_armed(timer)
    }

    /// Move the clock to `now` (ms), firing every timer due on the way in
    /// deadline order. Idle work is drained after each firing.
    pub fn advance_to(&mut self, now: u64) {
        self.flush();
        while let Some((timer, owner)) = self.timers.pop_due(now) {
            trace!("{} fired at {}ms", timer, self.timers.now());
            self.with_plugin(owner, |plugin, core, me| plugin.on_timer(core, me, timer));
            self.flush();
        }
        self.timers.set_now(now);
    }

    // ---------------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------------

    /// Register `activator` on the plugin's output
    pub fn add_binding(&mut self, me: PluginHandle, activator: ActivatorBinding) -> Option<BindingId> {
        let output = self.outputs.get_mut(&me.output)?;
        let id = BindingId(self.binding_ids.next());
        trace!("{} binds {} as {}", me.id, activator, id);
        output.add_binding(Binding {
            id,
            owner: me.id,
            activator,
        });
        Some(id)
    }

    pub fn remove_binding(&mut self, me: PluginHandle, binding: BindingId) -> bool {
        self.outputs
            .get_mut(&me.output)
            .is_some_and(|o| o.remove_binding(binding))
    }

    /// Call every binding on `output` matching the current modifiers and
    /// `trigger`. Returns whether any of them took the event.
    fn run_bindings(&mut self, output: OutputId, trigger: Trigger) -> bool {
        let modifiers = self.input.modifiers();
        let Some(matching) = self
            .outputs
            .get(&output)
            .map(|o| o.matching_bindings(modifiers, trigger))
        else {
            return false;
        };

        let (source, code) = match trigger {
            Trigger::Key(code) => (ActivatorSource::Keybinding, code),
            Trigger::Button(code) => (ActivatorSource::Buttonbinding, code),
        };

        let mut handled = false;
        for (binding, owner) in matching {
            // An earlier callback may have removed it
            if !self.outputs.get(&output).is_some_and(|o| o.has_binding(binding)) {
                continue;
            }
            handled |= self
                .with_plugin(owner, |plugin, core, me| {
                    plugin.on_activator(core, me, binding, source, code)
                })
                .unwrap_or(false);
        }
        handled
    }

    // ---------------------------------------------------------------------
    // Device input
    // ---------------------------------------------------------------------

    /// A key changed state. Returns whether a binding consumed the press.
    pub fn handle_key(&mut self, output: OutputId, code: u32, pressed: bool) -> bool {
        let state = PressState::from_pressed(pressed);
        self.input.update_key(code, state);

        self.publish(
            Scope::Global,
            channel::KEYBOARD_KEY,
            SignalData::Key(KeyEvent {
                output,
                code,
                state,
            }),
        );

        let handled = pressed && self.run_bindings(output, Trigger::Key(code));
        self.flush();
        handled
    }

    /// A pointer button changed state at the current cursor position
    pub fn handle_button(&mut self, output: OutputId, code: u32, pressed: bool) -> bool {
        let state = PressState::from_pressed(pressed);
        let (x, y) = self.input.cursor_position();

        self.publish(
            Scope::Global,
            channel::POINTER_BUTTON,
            SignalData::Button(ButtonEvent {
                output,
                code,
                state,
                x,
                y,
            }),
        );

        let handled = pressed && self.run_bindings(output, Trigger::Button(code));
        self.flush();
        handled
    }

    /// Move the cursor and recompute the surface under it
    pub fn pointer_motion(&mut self, output: OutputId, x: f64, y: f64) -> Option<SurfaceId> {
        let focus = self.surface_at(output, x, y);
        self.input.set_cursor(x, y, focus);
        self.flush();
        focus
    }

    /// A touch point went down
    pub fn touch_down(&mut self, output: OutputId, x: f64, y: f64) -> Option<SurfaceId> {
        let focus = self.surface_at(output, x, y);
        self.input.set_touch_focus(focus);
        self.publish(
            Scope::Global,
            channel::TOUCH_DOWN,
            SignalData::Touch(TouchEvent { output, x, y }),
        );
        self.flush();
        focus
    }

    /// Topmost mapped surface under `(x, y)` on `output`
    pub fn surface_at(&self, output: OutputId, x: f64, y: f64) -> Option<SurfaceId> {
        let output = self.outputs.get(&output)?;
        output.stack().iter_top_down().find_map(|view| {
            let view = self.views.get(view).filter(|v| v.mapped)?;
            self.surfaces
                .surface_at(view.main_surface, view.geometry.origin(), x, y)
        })
    }

    // ---------------------------------------------------------------------
    // Views and surfaces
    // ---------------------------------------------------------------------

    /// Track a new, unmapped view without an output
    pub fn create_view(&mut self, title: &str, role: ViewRole, geometry: Rectangle) -> ViewId {
        let id = self.views.allocate_id();
        let main = self
            .surfaces
            .create_main(id, (geometry.width, geometry.height));
        self.views.insert(View::new(id, title, role, geometry, main));
        id
    }

    /// Create an unmapped sub-surface or popup below `parent`
    pub fn create_surface(
        &mut self,
        parent: SurfaceId,
        kind: ChildKind,
        offset: Point,
        size: (u32, u32),
    ) -> Option<SurfaceId> {
        match self.surfaces.create_child(parent, kind, offset, size) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Surface creation refused: {}", e);
                None
            }
        }
    }

    pub fn map_surface(&mut self, id: SurfaceId) -> bool {
        let mapped = self.surfaces.set_mapped(id, true).unwrap_or_else(|e| {
            debug!("Map refused: {}", e);
            false
        });
        self.flush();
        mapped
    }

    pub fn unmap_surface(&mut self, id: SurfaceId) -> bool {
        let unmapped = self.surfaces.set_mapped(id, false).unwrap_or_else(|e| {
            debug!("Unmap refused: {}", e);
            false
        });
        if unmapped {
            self.input.forget_surface(id);
        }
        self.flush();
        unmapped
    }

    /// Destroy a child surface along with its own children
    pub fn destroy_surface(&mut self, id: SurfaceId) -> bool {
        match self.surfaces.destroy(id) {
            Ok(removed) => {
                for surface in removed {
                    self.input.forget_surface(surface);
                }
                self.flush();
                true
            }
            Err(e) => {
                debug!("Surface destruction refused: {}", e);
                false
            }
        }
    }

    /// Assign a view to an output (or none), moving it between stacks
    pub fn set_view_output(&mut self, view: ViewId, output: Option<OutputId>) -> bool {
        let Some(old) = self.views.get(view).map(|v| v.output) else {
            return false;
        };
        if output.is_some_and(|o| !self.outputs.contains_key(&o)) {
            return false;
        }
        if old == output {
            return true;
        }

        if let Some(prev) = old.and_then(|o| self.outputs.get_mut(&o)) {
            prev.stack_mut().remove(view);
            if prev.focused_view() == Some(view) {
                prev.set_focused(None);
            }
        }
        if let Some(next) = output.and_then(|o| self.outputs.get_mut(&o)) {
            next.stack_mut().push(view);
        }
        if let Some(v) = self.views.get_mut(view) {
            v.output = output;
        }

        debug!("{} moved from {:?} to {:?}", view, old, output);
        self.publish(
            Scope::View(view),
            channel::SET_OUTPUT,
            SignalData::ViewOutput {
                view,
                old,
                new: output,
            },
        );
        self.flush();
        true
    }

    pub fn map_view(&mut self, view: ViewId) -> bool {
        let Some(v) = self.views.get_mut(view) else {
            return false;
        };
        if v.mapped {
            return false;
        }
        v.mapped = true;
        let (main, output) = (v.main_surface, v.output);
        let _ = self.surfaces.set_mapped(main, true);

        debug!("🪟 Mapped {}", view);
        self.publish(Scope::View(view), channel::MAP, SignalData::View(view));
        if let Some(output) = output {
            self.publish(Scope::Output(output), channel::MAP_VIEW, SignalData::View(view));
        }
        self.flush();
        true
    }

    /// Unmap a view. If it held output focus, the output is left without
    /// focus.
    pub fn unmap_view(&mut self, view: ViewId) -> bool {
        let Some(v) = self.views.get_mut(view) else {
            return false;
        };
        if !v.mapped {
            return false;
        }
        v.mapped = false;
        let (main, output) = (v.main_surface, v.output);
        let _ = self.surfaces.set_mapped(main, false);
        self.input.forget_surface(main);

        if let Some(o) = output.and_then(|o| self.outputs.get_mut(&o)) {
            if o.focused_view() == Some(view) {
                o.set_focused(None);
            }
        }

        debug!("🪟 Unmapped {}", view);
        self.publish(Scope::View(view), channel::UNMAP, SignalData::View(view));
        if let Some(output) = output {
            self.publish(Scope::Output(output), channel::UNMAP_VIEW, SignalData::View(view));
        }
        self.publish(Scope::View(view), channel::DISAPPEARED, SignalData::View(view));
        self.flush();
        true
    }

    /// Destroy a view: it is unmapped if needed, unlinked from its parent,
    /// its children become roots and its view-scoped subscriptions are
    /// revoked.
    pub fn destroy_view(&mut self, view: ViewId) -> bool {
        if !self.views.contains(view) {
            return false;
        }

        self.depth += 1;
        if !self.unmap_view(view) {
            self.publish(Scope::View(view), channel::DISAPPEARED, SignalData::View(view));
        }
        self.depth -= 1;

        let Some(removed) = self.views.remove(view) else {
            return false;
        };
        if let Some(o) = removed.output.and_then(|o| self.outputs.get_mut(&o)) {
            o.stack_mut().remove(view);
            if o.focused_view() == Some(view) {
                o.set_focused(None);
            }
        }
        for surface in self.surfaces.destroy_main(removed.main_surface) {
            self.input.forget_surface(surface);
        }

        let revoked = self.bus.revoke_scope(Scope::View(view));
        debug!("🪟 Destroyed {} ({} subscription(s) revoked)", view, revoked);
        self.flush();
        true
    }

    /// Reparent a view. Cycles and unknown views are refused.
    pub fn set_view_parent(&mut self, child: ViewId, parent: Option<ViewId>) -> bool {
        match self.views.set_parent(child, parent) {
            Ok(()) => true,
            Err(e) => {
                debug!("Reparent refused: {}", e);
                false
            }
        }
    }

    pub fn set_view_geometry(&mut self, view: ViewId, geometry: Rectangle) -> bool {
        let Some(v) = self.views.get_mut(view) else {
            return false;
        };
        v.geometry = geometry;
        let main = v.main_surface;
        let _ = self.surfaces.set_size(main, (geometry.width, geometry.height));
        true
    }

    /// The client changed its decoration preference
    pub fn request_decoration(&mut self, view: ViewId, wanted: bool) -> bool {
        let Some(v) = self.views.get_mut(view) else {
            return false;
        };
        v.decoration_requested = wanted;
        if let Some(output) = v.output {
            self.publish(
                Scope::Output(output),
                channel::DECORATION_STATE_UPDATED_VIEW,
                SignalData::View(view),
            );
        }
        self.flush();
        true
    }

    /// Attach or detach a decorator
    pub fn set_view_decorated(&mut self, view: ViewId, decorated: bool) -> bool {
        match self.views.get_mut(view) {
            Some(v) => {
                v.decorated = decorated;
                true
            }
            None => false,
        }
    }

    /// Change the part of an output not reserved by panels
    pub fn set_workarea(&mut self, output: OutputId, workarea: Rectangle) -> bool {
        let changed = self
            .outputs
            .get_mut(&output)
            .is_some_and(|o| o.set_workarea(workarea));
        if changed {
            self.publish(
                Scope::Output(output),
                channel::RESERVED_WORKAREA,
                SignalData::Output(output),
            );
            self.flush();
        }
        changed
    }

    // ---------------------------------------------------------------------
    // Focus
    // ---------------------------------------------------------------------

    /// Give `view` the output's focus, raise it and publish `focus-view`.
    /// `None` clears focus.
    pub fn focus_view(&mut self, output: OutputId, view: Option<ViewId>) -> bool {
        if view.is_some_and(|v| !self.views.contains(v)) {
            return false;
        }
        let Some(o) = self.outputs.get_mut(&output) else {
            return false;
        };

        if let Some(view) = view {
            o.stack_mut().raise_to_top(view);
        }
        o.set_focused(view);
        debug!("🎯 {} focus -> {:?}", output, view);

        self.publish(Scope::Output(output), channel::FOCUS_VIEW, SignalData::Focus(view));
        self.flush();
        true
    }

    /// Place `view` directly above `above` in the output's stack
    pub fn restack_above(&mut self, output: OutputId, view: ViewId, above: ViewId) -> bool {
        self.outputs
            .get_mut(&output)
            .is_some_and(|o| o.stack_mut().raise_above(view, above))
    }

    pub fn mark_focus_pending(&mut self, output: OutputId, view: ViewId) {
        if let Some(o) = self.outputs.get_mut(&output) {
            o.mark_focus_pending(view);
        }
    }

    pub fn clear_focus_pending(&mut self, output: OutputId) -> Option<ViewId> {
        self.outputs.get_mut(&output)?.clear_focus_pending()
    }

    /// A client asked for `surface` to receive focus
    pub fn request_focus(&mut self, surface: SurfaceId) -> bool {
        let Some(output) = self
            .surfaces
            .owning_view(surface)
            .and_then(|v| self.views.get(v))
            .and_then(|v| v.output)
        else {
            return false;
        };

        self.publish(
            Scope::Output(output),
            channel::WM_FOCUS_REQUEST,
            SignalData::FocusRequest(surface),
        );
        self.flush();
        true
    }

    /// Send "done" to every live popup of every view in `view`'s group.
    /// Each popup is dismissed at most once. Returns how many were told.
    pub fn dismiss_popups(&mut self, view: ViewId) -> usize {
        let Some(root) = self.views.root_of(view) else {
            return 0;
        };

        let mut dismissed = 0;
        for member in self.views.group_members(root) {
            let Some((main, output)) = self.views.get(member).map(|v| (v.main_surface, v.output))
            else {
                continue;
            };

            for popup in self.surfaces.live_popups(main) {
                if !self.surfaces.send_done(popup) {
                    continue;
                }
                dismissed += 1;
                self.backend.send_popup_done(popup);
                if let Some(output) = output {
                    self.publish(
                        Scope::Output(output),
                        channel::POPUP_DONE,
                        SignalData::Popup {
                            view: member,
                            surface: popup,
                        },
                    );
                }
            }
        }

        if dismissed > 0 {
            debug!("Dismissed {} popup(s) of group {}", dismissed, root);
        }
        dismissed
    }

    // ---------------------------------------------------------------------
    // Outward requests
    // ---------------------------------------------------------------------

    pub fn run_command(&mut self, command: &str) {
        debug!("▶️ Running `{}`", command);
        self.backend.run_command(command);
    }

    pub fn close_view(&mut self, view: ViewId) {
        self.backend.close_view(view);
    }

    /// Replace the configuration and tell plugins to pick it up
    pub fn reload_config(&mut self, config: ShellConfig) {
        info!("🔄 Reloading configuration");
        self.config = config;
        self.publish(Scope::Global, channel::RELOAD_CONFIG, SignalData::None);
        self.flush();
    }

    /// Stop the shell; the embedder's loop exits once it sees this
    pub fn terminate(&mut self) {
        if self.running {
            info!("🛑 Terminating");
            self.running = false;
            self.publish(Scope::Global, channel::SHUTDOWN, SignalData::None);
            self.backend.terminate();
        }
    }

    /// Unload every plugin, last loaded first
    pub fn teardown(&mut self) {
        let ids: Vec<PluginId> = self.plugins.keys().rev().copied().collect();
        for id in ids {
            self.unload_plugin(id);
        }
        self.running = false;
        info!("✅ Shell core shut down");
    }
}
