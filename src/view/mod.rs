//! View tree
//!
//! Views form parent/child groups: a dialog belongs to its toplevel, a
//! nested dialog to that dialog, and so on. A child only refers to its parent
//! by id, so a parent going away never leaves a dangling reference behind;
//! the child just becomes a root.
//!
//! The parent chain is kept acyclic at mutation time, which means walking to
//! the root always terminates.

use log::debug;
use std::collections::HashMap;

use crate::error::TreeError;
use crate::types::{IdAllocator, OutputId, Rectangle, SurfaceId, ViewId};

/// What kind of window a view is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRole {
    /// Regular application window
    Toplevel,
    /// Dialogs and other windows tied to a parent
    Transient,
    /// Override-redirect style windows the shell does not manage
    Unmanaged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub id: ViewId,
    pub title: String,
    pub role: ViewRole,
    pub mapped: bool,
    parent: Option<ViewId>,
    /// Children, topmost (newest) first
    children: Vec<ViewId>,
    pub output: Option<OutputId>,
    pub geometry: Rectangle,
    pub main_surface: SurfaceId,
    /// Whether the view can take keyboard focus
    pub keyboard_focusable: bool,
    /// The client asked for server-side decorations
    pub decoration_requested: bool,
    /// A decorator is currently attached
    pub decorated: bool,
}

impl View {
    pub fn new(
        id: ViewId,
        title: impl Into<String>,
        role: ViewRole,
        geometry: Rectangle,
        main_surface: SurfaceId,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            role,
            mapped: false,
            parent: None,
            children: Vec::new(),
            output: None,
            geometry,
            main_surface,
            keyboard_focusable: role != ViewRole::Unmanaged,
            decoration_requested: role == ViewRole::Toplevel,
            decorated: false,
        }
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn children(&self) -> &[ViewId] {
        &self.children
    }

    pub fn should_be_decorated(&self) -> bool {
        self.role == ViewRole::Toplevel && self.decoration_requested
    }
}

#[derive(Debug, Default)]
pub struct ViewTree {
    ids: IdAllocator,
    views: HashMap<ViewId, View>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the id for a view about to be inserted
    pub fn allocate_id(&mut self) -> ViewId {
        ViewId(self.ids.next())
    }

    pub fn insert(&mut self, view: View) {
        debug!("Tracking {} ({:?}) \"{}\"", view.id, view.role, view.title);
        self.views.insert(view.id, view);
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.get_mut(&id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.views.contains_key(&id)
    }

    pub fn is_mapped(&self, id: ViewId) -> bool {
        self.views.get(&id).is_some_and(|v| v.mapped)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    /// Reparent `child`. `None` detaches it and makes it a root.
    pub fn set_parent(&mut self, child: ViewId, parent: Option<ViewId>) -> Result<(), TreeError> {
        if !self.views.contains_key(&child) {
            return Err(TreeError::UnknownView(child));
        }

        if let Some(parent) = parent {
            if parent == child {
                return Err(TreeError::SelfParent(child));
            }
            if !self.views.contains_key(&parent) {
                return Err(TreeError::UnknownView(parent));
            }
            if self.ancestors(parent).any(|a| a == child) {
                return Err(TreeError::Cycle { child, parent });
            }
        }

        self.detach(child);
        if let Some(parent) = parent {
            if let Some(p) = self.views.get_mut(&parent) {
                p.children.insert(0, child);
            }
        }
        if let Some(c) = self.views.get_mut(&child) {
            c.parent = parent;
        }
        Ok(())
    }

    fn detach(&mut self, child: ViewId) {
        let old_parent = self.views.get_mut(&child).and_then(|c| c.parent.take());
        if let Some(old) = old_parent.and_then(|id| self.views.get_mut(&id)) {
            old.children.retain(|c| *c != child);
        }
    }

    /// `id` itself followed by each ancestor up to the root
    pub fn ancestors(&self, id: ViewId) -> impl Iterator<Item = ViewId> + '_ {
        let limit = self.views.len();
        std::iter::successors(self.views.contains_key(&id).then_some(id), move |current| {
            self.views.get(current).and_then(|v| v.parent)
        })
        .take(limit)
    }

    /// Root of the group `id` belongs to
    pub fn root_of(&self, id: ViewId) -> Option<ViewId> {
        self.ancestors(id).last()
    }

    /// Mapped views of the group rooted at `root`, top to bottom: each
    /// child's subtree before the view itself. An unmapped view hides its
    /// whole subtree.
    pub fn enumerate_mapped(&self, root: ViewId) -> Vec<ViewId> {
        let Some(view) = self.views.get(&root).filter(|v| v.mapped) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for child in &view.children {
            out.extend(self.enumerate_mapped(*child));
        }
        out.push(root);
        out
    }

    /// Every view of the group rooted at `root`, mapped or not, root first
    pub fn group_members(&self, root: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if let Some(view) = self.views.get(&id) {
                out.push(id);
                pending.extend(view.children.iter().rev().copied());
            }
        }
        out
    }

    /// Stop tracking `id`. Its children become roots.
    pub fn remove(&mut self, id: ViewId) -> Option<View> {
        self.detach(id);
        let view = self.views.remove(&id)?;
        for child in &view.children {
            if let Some(c) = self.views.get_mut(child) {
                c.parent = None;
            }
        }
        debug!("Stopped tracking {}", id);
        Some(view)
    }
}
