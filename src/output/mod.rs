//! Outputs
//!
//! An output is a display region with its own focus, stacking order,
//! workarea, activation arbiter and binding table. Outputs are created and
//! destroyed by the display layer; the core only tracks them.

pub mod stack;

use crate::arbiter::Arbiter;
use crate::input::{ActivatorBinding, Modifiers, Trigger};
use crate::types::{BindingId, OutputId, PluginId, Rectangle, ViewId};

use stack::ViewStack;

/// Focus state machine of one output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusState {
    NoFocus,
    /// A deferred focus application for this view is scheduled
    FocusPending(ViewId),
    Focused(ViewId),
}

/// A binding registered by a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub id: BindingId,
    pub owner: PluginId,
    pub activator: ActivatorBinding,
}

#[derive(Debug)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub geometry: Rectangle,
    workarea: Rectangle,
    pub arbiter: Arbiter,
    stack: ViewStack,
    focused: Option<ViewId>,
    pending_focus: Option<ViewId>,
    bindings: Vec<Binding>,
}

impl Output {
    pub fn new(id: OutputId, name: impl Into<String>, geometry: Rectangle) -> Self {
        Self {
            id,
            name: name.into(),
            geometry,
            workarea: geometry,
            arbiter: Arbiter::new(),
            stack: ViewStack::new(),
            focused: None,
            pending_focus: None,
            bindings: Vec::new(),
        }
    }

    pub fn workarea(&self) -> Rectangle {
        self.workarea
    }

    pub(crate) fn set_workarea(&mut self, workarea: Rectangle) -> bool {
        let changed = self.workarea != workarea;
        self.workarea = workarea;
        changed
    }

    pub fn is_inhibited(&self) -> bool {
        self.arbiter.is_inhibited()
    }

    pub fn stack(&self) -> &ViewStack {
        &self.stack
    }

    pub(crate) fn stack_mut(&mut self) -> &mut ViewStack {
        &mut self.stack
    }

    /// The view holding keyboard focus
    pub fn focused_view(&self) -> Option<ViewId> {
        self.focused
    }

    pub(crate) fn set_focused(&mut self, view: Option<ViewId>) {
        self.focused = view;
    }

    pub fn focus_state(&self) -> FocusState {
        match (self.pending_focus, self.focused) {
            (Some(pending), _) => FocusState::FocusPending(pending),
            (None, Some(focused)) => FocusState::Focused(focused),
            (None, None) => FocusState::NoFocus,
        }
    }

    pub fn mark_focus_pending(&mut self, view: ViewId) {
        self.pending_focus = Some(view);
    }

    /// Leave the pending state, returning the view that was pending
    pub fn clear_focus_pending(&mut self) -> Option<ViewId> {
        self.pending_focus.take()
    }

    pub(crate) fn add_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub(crate) fn remove_binding(&mut self, id: BindingId) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.id != id);
        before != self.bindings.len()
    }

    pub(crate) fn remove_owner_bindings(&mut self, owner: PluginId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.owner != owner);
        before - self.bindings.len()
    }

    /// Bindings matching an exact modifier set and trigger, in registration
    /// order
    pub fn matching_bindings(&self, modifiers: Modifiers, trigger: Trigger) -> Vec<(BindingId, PluginId)> {
        self.bindings
            .iter()
            .filter(|b| b.activator.matches(modifiers, trigger))
            .map(|b| (b.id, b.owner))
            .collect()
    }

    pub fn has_binding(&self, id: BindingId) -> bool {
        self.bindings.iter().any(|b| b.id == id)
    }

    pub fn binding_count(&self, owner: PluginId) -> usize {
        self.bindings.iter().filter(|b| b.owner == owner).count()
    }
}
