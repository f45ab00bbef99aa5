//! Plugin activation arbiter
//!
//! Each output owns one [`Arbiter`]. Plugins ask it for temporary exclusive
//! ownership of capability tokens before they react to input; a request is
//! refused when another plugin holds any of the requested tokens, or when the
//! output is inhibited (e.g. locked) and the request does not carry
//! [`ActivationFlags::IGNORE_INHIBIT`].
//!
//! The arbiter does not interpret capability tags, it only keeps them
//! mutually exclusive.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::types::PluginId;

/// Exclusive right to decorate views
pub const VIEW_DECORATION: &str = "view-decoration";
/// Exclusive right to react to raw input
pub const GRAB_INPUT: &str = "grab-input";
/// Exclusive right to change focus and stacking
pub const MANAGE_DESKTOP: &str = "manage-desktop";

/// A named exclusive right
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability(String);

impl Capability {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of capability tokens requested or held together
pub type Capabilities = BTreeSet<Capability>;

/// Build a capability set from tags
pub fn capabilities(tags: &[&str]) -> Capabilities {
    tags.iter().map(|tag| Capability::new(*tag)).collect()
}

/// Modifiers for an activation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationFlags {
    /// Allow activation while the output is inhibited
    pub ignore_inhibit: bool,
}

impl ActivationFlags {
    pub const NONE: Self = Self {
        ignore_inhibit: false,
    };
    pub const IGNORE_INHIBIT: Self = Self {
        ignore_inhibit: true,
    };
}

/// Why an activation request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The output is inhibited and the request did not ignore it
    Inhibited,
    /// Another plugin holds one of the requested tokens
    Held {
        capability: Capability,
        holder: PluginId,
    },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Inhibited => f.write_str("output is inhibited"),
            Denial::Held { capability, holder } => {
                write!(f, "capability {} is held by {}", capability, holder)
            }
        }
    }
}

/// Per-output registry of granted capability tokens
#[derive(Debug, Default, Clone)]
pub struct Arbiter {
    inhibited: bool,
    /// Active plugins and the tokens each holds. A plugin may be active with
    /// an empty set.
    active: BTreeMap<PluginId, Capabilities>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_inhibited(&self) -> bool {
        self.inhibited
    }

    pub fn set_inhibited(&mut self, inhibited: bool) {
        if self.inhibited != inhibited {
            debug!("Arbiter inhibited: {}", inhibited);
        }
        self.inhibited = inhibited;
    }

    /// Check whether `plugin` could acquire `requested` right now
    pub fn check(
        &self,
        plugin: PluginId,
        requested: &Capabilities,
        flags: ActivationFlags,
    ) -> Result<(), Denial> {
        if self.inhibited && !flags.ignore_inhibit {
            return Err(Denial::Inhibited);
        }

        for (&holder, held) in &self.active {
            if holder == plugin {
                continue;
            }
            if let Some(capability) = held.intersection(requested).next() {
                return Err(Denial::Held {
                    capability: capability.clone(),
                    holder,
                });
            }
        }

        Ok(())
    }

    /// Grant every requested token to `plugin`, or none of them.
    ///
    /// Re-activation by the current holder succeeds and merges the sets.
    pub fn activate(
        &mut self,
        plugin: PluginId,
        requested: &Capabilities,
        flags: ActivationFlags,
    ) -> bool {
        if let Err(denial) = self.check(plugin, requested, flags) {
            trace!("Activation of {} refused: {}", plugin, denial);
            return false;
        }

        self.active
            .entry(plugin)
            .or_default()
            .extend(requested.iter().cloned());
        true
    }

    /// Release every token held by `plugin`. Returns whether it was active;
    /// calling this for an inactive plugin is a no-op.
    pub fn deactivate(&mut self, plugin: PluginId) -> bool {
        self.active.remove(&plugin).is_some()
    }

    /// The plugin currently holding `capability`
    pub fn holder(&self, capability: &Capability) -> Option<PluginId> {
        self.active
            .iter()
            .find(|(_, held)| held.contains(capability))
            .map(|(plugin, _)| *plugin)
    }

    pub fn is_active(&self, plugin: PluginId) -> bool {
        self.active.contains_key(&plugin)
    }

    pub fn held_by(&self, plugin: PluginId) -> Option<&Capabilities> {
        self.active.get(&plugin)
    }

    pub fn active_plugins(&self) -> impl Iterator<Item = PluginId> + '_ {
        self.active.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PluginId = PluginId(1);
    const B: PluginId = PluginId(2);

    #[test]
    fn test_same_turn_contention_has_one_winner() {
        let mut arbiter = Arbiter::new();
        let grab = capabilities(&[GRAB_INPUT]);

        assert!(arbiter.activate(A, &grab, ActivationFlags::NONE));
        assert!(!arbiter.activate(B, &grab, ActivationFlags::NONE));
        assert_eq!(arbiter.holder(&Capability::new(GRAB_INPUT)), Some(A));
    }

    #[test]
    fn test_grant_is_atomic() {
        let mut arbiter = Arbiter::new();
        assert!(arbiter.activate(A, &capabilities(&[GRAB_INPUT]), ActivationFlags::NONE));

        let both = capabilities(&[GRAB_INPUT, MANAGE_DESKTOP]);
        assert!(!arbiter.activate(B, &both, ActivationFlags::NONE));

        // The free token must not have been granted either
        assert_eq!(arbiter.holder(&Capability::new(MANAGE_DESKTOP)), None);
        assert!(!arbiter.is_active(B));
    }

    #[test]
    fn test_disjoint_capabilities_coexist() {
        let mut arbiter = Arbiter::new();
        assert!(arbiter.activate(A, &capabilities(&[GRAB_INPUT]), ActivationFlags::NONE));
        assert!(arbiter.activate(B, &capabilities(&[VIEW_DECORATION]), ActivationFlags::NONE));
        assert_eq!(arbiter.active_plugins().count(), 2);
    }

    #[test]
    fn test_inhibit_blocks_plain_requests_only() {
        let mut arbiter = Arbiter::new();
        arbiter.set_inhibited(true);
        let grab = capabilities(&[GRAB_INPUT]);

        assert_eq!(
            arbiter.check(A, &grab, ActivationFlags::NONE),
            Err(Denial::Inhibited)
        );
        assert!(!arbiter.activate(A, &grab, ActivationFlags::NONE));
        assert!(arbiter.activate(A, &grab, ActivationFlags::IGNORE_INHIBIT));
    }

    #[test]
    fn test_ignore_inhibit_does_not_preempt_holder() {
        let mut arbiter = Arbiter::new();
        let grab = capabilities(&[GRAB_INPUT]);
        assert!(arbiter.activate(A, &grab, ActivationFlags::NONE));
        arbiter.set_inhibited(true);

        assert!(!arbiter.activate(B, &grab, ActivationFlags::IGNORE_INHIBIT));
    }

    #[test]
    fn test_reactivation_merges() {
        let mut arbiter = Arbiter::new();
        assert!(arbiter.activate(A, &capabilities(&[GRAB_INPUT]), ActivationFlags::NONE));
        assert!(arbiter.activate(A, &capabilities(&[MANAGE_DESKTOP]), ActivationFlags::NONE));
        assert_eq!(arbiter.held_by(A).map(|held| held.len()), Some(2));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut arbiter = Arbiter::new();
        assert!(!arbiter.deactivate(A));

        arbiter.activate(A, &capabilities(&[GRAB_INPUT]), ActivationFlags::NONE);
        assert!(arbiter.deactivate(A));
        assert!(!arbiter.deactivate(A));
        assert_eq!(arbiter.holder(&Capability::new(GRAB_INPUT)), None);
    }

    #[test]
    fn test_empty_request_still_marks_active() {
        let mut arbiter = Arbiter::new();
        assert!(arbiter.activate(A, &Capabilities::new(), ActivationFlags::NONE));
        assert!(arbiter.is_active(A));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_each_capability_has_at_most_one_holder(
                ops in prop::collection::vec((0u64..4, 0usize..3, any::<bool>(), any::<bool>()), 1..64)
            ) {
                let tags = [GRAB_INPUT, MANAGE_DESKTOP, VIEW_DECORATION];
                let mut arbiter = Arbiter::new();

                for (plugin, tag, activate, inhibit) in ops {
                    arbiter.set_inhibited(inhibit);
                    let plugin = PluginId(plugin);
                    if activate {
                        arbiter.activate(plugin, &capabilities(&[tags[tag]]), ActivationFlags::IGNORE_INHIBIT);
                    } else {
                        arbiter.deactivate(plugin);
                    }

                    for tag in tags {
                        let holders = arbiter
                            .active_plugins()
                            .filter(|p| arbiter.held_by(*p).is_some_and(|held| held.contains(&Capability::new(tag))))
                            .count();
                        prop_assert!(holders <= 1);
                    }
                }
            }
        }
    }
}
