//! Signal bus
//!
//! Named-channel publish/subscribe between the core and plugins. A
//! subscription is a `(scope, channel, owner)` triple; handlers are not
//! closures but plugin callbacks, so the bus only stores who wants what and
//! the [`Core`](crate::compositor::Core) routes each delivery to the owning plugin.
//!
//! Dispatch always works on a snapshot of the subscriber list. A subscription
//! removed while a pass is running is skipped when its turn comes, and one
//! added during the pass only sees later publications.

use log::trace;
use std::collections::HashMap;

use crate::input::{ButtonEvent, KeyEvent, TouchEvent};
use crate::types::{IdAllocator, OutputId, PluginId, SubscriptionId, SurfaceId, ViewId};

/// Well-known channel names
pub mod channel {
    /// A view was mapped on an output
    pub const MAP_VIEW: &str = "map-view";
    /// A view was unmapped from an output
    pub const UNMAP_VIEW: &str = "unmap-view";
    /// The output focused a view (or dropped focus)
    pub const FOCUS_VIEW: &str = "focus-view";
    /// Someone asks the window manager to focus a surface
    pub const WM_FOCUS_REQUEST: &str = "wm-focus-request";
    /// The output's usable workarea changed
    pub const RESERVED_WORKAREA: &str = "reserved-workarea";
    /// A view changed its decoration preference
    pub const DECORATION_STATE_UPDATED_VIEW: &str = "decoration-state-updated-view";
    /// A plugin became active or fully inactive on an output
    pub const PLUGIN_ACTIVATION_CHANGED: &str = "plugin-activation-changed";
    /// A popup surface was told to dismiss itself
    pub const POPUP_DONE: &str = "popup-done";

    /// Raw pointer button event
    pub const POINTER_BUTTON: &str = "pointer_button";
    /// Raw keyboard key event
    pub const KEYBOARD_KEY: &str = "keyboard_key";
    /// Raw touch-down event
    pub const TOUCH_DOWN: &str = "touch_down";
    /// Configuration was replaced
    pub const RELOAD_CONFIG: &str = "reload-config";
    /// The shell is about to exit
    pub const SHUTDOWN: &str = "shutdown";

    // View-scoped channels
    pub const MAP: &str = "map";
    pub const UNMAP: &str = "unmap";
    pub const DISAPPEARED: &str = "disappeared";
    pub const SET_OUTPUT: &str = "set-output";
}

/// Where a subscription listens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Process-wide channels (input, reload, shutdown)
    Global,
    /// Channels emitted by one output
    Output(OutputId),
    /// Channels emitted by one view
    View(ViewId),
}

/// Payload carried by a signal
#[derive(Debug, Clone, PartialEq)]
pub enum SignalData {
    None,
    View(ViewId),
    Focus(Option<ViewId>),
    FocusRequest(SurfaceId),
    ViewOutput {
        view: ViewId,
        old: Option<OutputId>,
        new: Option<OutputId>,
    },
    Output(OutputId),
    Activation {
        plugin: PluginId,
        active: bool,
    },
    Popup {
        view: ViewId,
        surface: SurfaceId,
    },
    Key(KeyEvent),
    Button(ButtonEvent),
    Touch(TouchEvent),
}

impl SignalData {
    /// The view this payload is about, if any
    pub fn view(&self) -> Option<ViewId> {
        match self {
            SignalData::View(view) => Some(*view),
            SignalData::Focus(view) => *view,
            SignalData::ViewOutput { view, .. } | SignalData::Popup { view, .. } => Some(*view),
            _ => None,
        }
    }
}

/// A published event, borrowed by handlers for the duration of one call
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub scope: Scope,
    pub channel: String,
    pub data: SignalData,
}

impl Signal {
    pub fn new(scope: Scope, channel: &str, data: SignalData) -> Self {
        Self {
            scope,
            channel: channel.to_string(),
            data,
        }
    }

    pub fn is(&self, channel: &str) -> bool {
        self.channel == channel
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: SubscriptionId,
    owner: PluginId,
}

type Key = (Scope, String);

/// Subscription registry
#[derive(Debug, Default)]
pub struct SignalBus {
    ids: IdAllocator,
    handlers: HashMap<Key, Vec<Entry>>,
    index: HashMap<SubscriptionId, Key>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` for `channel` on `scope`. Handlers fire in the order
    /// they were registered.
    pub fn subscribe(&mut self, scope: Scope, channel: &str, owner: PluginId) -> SubscriptionId {
        let id = SubscriptionId(self.ids.next());
        let key = (scope, channel.to_string());
        self.handlers
            .entry(key.clone())
            .or_default()
            .push(Entry { id, owner });
        self.index.insert(id, key);
        trace!("{} subscribed {} to {:?}/{}", owner, id, scope, channel);
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };

        if let Some(entries) = self.handlers.get_mut(&key) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                self.handlers.remove(&key);
            }
        }
        true
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Snapshot of the handlers for one channel, in registration order
    pub fn snapshot(&self, scope: Scope, channel: &str) -> Vec<(SubscriptionId, PluginId)> {
        self.handlers
            .get(&(scope, channel.to_string()))
            .map(|entries| entries.iter().map(|e| (e.id, e.owner)).collect())
            .unwrap_or_default()
    }

    /// Drop every subscription on `scope`, e.g. when a view is destroyed
    pub fn revoke_scope(&mut self, scope: Scope) -> usize {
        let ids: Vec<SubscriptionId> = self
            .index
            .iter()
            .filter(|(_, (s, _))| *s == scope)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
    }

    /// Drop every subscription held by `owner`
    pub fn revoke_owner(&mut self, owner: PluginId) -> usize {
        let ids: Vec<SubscriptionId> = self
            .handlers
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|e| e.owner == owner)
            .map(|e| e.id)
            .collect();
        ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
    }

    /// Number of live subscriptions on a scope
    pub fn scope_count(&self, scope: Scope) -> usize {
        self.index.values().filter(|(s, _)| *s == scope).count()
    }

    /// Number of live subscriptions held by a plugin
    pub fn owner_count(&self, owner: PluginId) -> usize {
        self.handlers
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|e| e.owner == owner)
            .count()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PluginId = PluginId(1);
    const B: PluginId = PluginId(2);

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let mut bus = SignalBus::new();
        let s1 = bus.subscribe(Scope::Global, channel::SHUTDOWN, B);
        let s2 = bus.subscribe(Scope::Global, channel::SHUTDOWN, A);
        let s3 = bus.subscribe(Scope::Global, channel::SHUTDOWN, B);

        assert_eq!(
            bus.snapshot(Scope::Global, channel::SHUTDOWN),
            vec![(s1, B), (s2, A), (s3, B)]
        );
    }

    #[test]
    fn test_channels_are_scoped() {
        let mut bus = SignalBus::new();
        bus.subscribe(Scope::Output(OutputId(1)), channel::FOCUS_VIEW, A);

        assert!(bus.snapshot(Scope::Output(OutputId(2)), channel::FOCUS_VIEW).is_empty());
        assert!(bus.snapshot(Scope::Global, channel::FOCUS_VIEW).is_empty());
        assert_eq!(bus.snapshot(Scope::Output(OutputId(1)), channel::FOCUS_VIEW).len(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let mut bus = SignalBus::new();
        let id = bus.subscribe(Scope::Global, channel::KEYBOARD_KEY, A);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!bus.is_subscribed(id));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let mut bus = SignalBus::new();
        let s1 = bus.subscribe(Scope::Global, channel::KEYBOARD_KEY, A);
        let snapshot = bus.snapshot(Scope::Global, channel::KEYBOARD_KEY);

        bus.unsubscribe(s1);
        bus.subscribe(Scope::Global, channel::KEYBOARD_KEY, B);

        assert_eq!(snapshot, vec![(s1, A)]);
        assert!(!bus.is_subscribed(snapshot[0].0));
    }

    #[test]
    fn test_revoke_scope_and_owner() {
        let mut bus = SignalBus::new();
        let view = Scope::View(ViewId(7));
        bus.subscribe(view, channel::UNMAP, A);
        bus.subscribe(view, channel::DISAPPEARED, B);
        bus.subscribe(Scope::Global, channel::SHUTDOWN, A);

        assert_eq!(bus.revoke_scope(view), 2);
        assert_eq!(bus.scope_count(view), 0);
        assert_eq!(bus.owner_count(A), 1);

        assert_eq!(bus.revoke_owner(A), 1);
        assert!(bus.is_empty());
    }
}
