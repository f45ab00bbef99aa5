//! Surface tree
//!
//! Every view owns one main surface. Sub-surfaces and popups hang below it
//! with an offset relative to their parent. A surface's parent is fixed when
//! it is created and must already exist, so the tree cannot form cycles.
//!
//! Child surfaces follow the external map/unmap/destroy triple. Only mapped
//! surfaces are paintable or eligible for input, and an unmapped surface has
//! no defined offset.

use log::{debug, trace};
use std::collections::HashMap;

use crate::error::TreeError;
use crate::types::{IdAllocator, Point, SurfaceId, ViewId};

/// Closed set of surface kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    /// The main surface of a view
    Main { view: ViewId },
    /// Plain sub-surface
    Subsurface,
    /// Transient popup (menus, tooltips). `done` is set once it has been
    /// told to dismiss itself.
    Popup { done: bool },
}

impl SurfaceRole {
    pub fn is_popup(&self) -> bool {
        matches!(self, SurfaceRole::Popup { .. })
    }
}

/// Kind of child surface a client can create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Subsurface,
    Popup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: SurfaceId,
    pub role: SurfaceRole,
    pub parent: Option<SurfaceId>,
    /// Children, bottom to top
    pub children: Vec<SurfaceId>,
    offset: Point,
    pub size: (u32, u32),
    pub mapped: bool,
}

impl Surface {
    /// Offset relative to the parent; only defined while mapped
    pub fn offset(&self) -> Option<Point> {
        self.mapped.then_some(self.offset)
    }
}

#[derive(Debug, Default)]
pub struct SurfaceTree {
    ids: IdAllocator,
    surfaces: HashMap<SurfaceId, Surface>,
}

impl SurfaceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the main surface for `view`
    pub fn create_main(&mut self, view: ViewId, size: (u32, u32)) -> SurfaceId {
        let id = SurfaceId(self.ids.next());
        self.surfaces.insert(
            id,
            Surface {
                id,
                role: SurfaceRole::Main { view },
                parent: None,
                children: Vec::new(),
                offset: Point::default(),
                size,
                mapped: false,
            },
        );
        id
    }

    /// Create an unmapped child surface on top of `parent`'s children
    pub fn create_child(
        &mut self,
        parent: SurfaceId,
        kind: ChildKind,
        offset: Point,
        size: (u32, u32),
    ) -> Result<SurfaceId, TreeError> {
        if !self.surfaces.contains_key(&parent) {
            return Err(TreeError::UnknownSurface(parent));
        }

        let id = SurfaceId(self.ids.next());
        let role = match kind {
            ChildKind::Subsurface => SurfaceRole::Subsurface,
            ChildKind::Popup => SurfaceRole::Popup { done: false },
        };
        self.surfaces.insert(
            id,
            Surface {
                id,
                role,
                parent: Some(parent),
                children: Vec::new(),
                offset,
                size,
                mapped: false,
            },
        );
        if let Some(p) = self.surfaces.get_mut(&parent) {
            p.children.push(id);
        }
        trace!("Created {:?} {} under {}", kind, id, parent);
        Ok(id)
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn is_mapped(&self, id: SurfaceId) -> bool {
        self.surfaces.get(&id).is_some_and(|s| s.mapped)
    }

    /// Returns whether the mapped state changed
    pub fn set_mapped(&mut self, id: SurfaceId, mapped: bool) -> Result<bool, TreeError> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(TreeError::UnknownSurface(id))?;
        let changed = surface.mapped != mapped;
        surface.mapped = mapped;
        Ok(changed)
    }

    pub fn set_offset(&mut self, id: SurfaceId, offset: Point) -> Result<(), TreeError> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(TreeError::UnknownSurface(id))?;
        surface.offset = offset;
        Ok(())
    }

    pub fn set_size(&mut self, id: SurfaceId, size: (u32, u32)) -> Result<(), TreeError> {
        let surface = self
            .surfaces
            .get_mut(&id)
            .ok_or(TreeError::UnknownSurface(id))?;
        surface.size = size;
        Ok(())
    }

    /// Destroy a child surface and everything below it. The surface removes
    /// itself from its parent's child list. Returns the removed ids.
    pub fn destroy(&mut self, id: SurfaceId) -> Result<Vec<SurfaceId>, TreeError> {
        let surface = self.surfaces.get(&id).ok_or(TreeError::UnknownSurface(id))?;
        if matches!(surface.role, SurfaceRole::Main { .. }) {
            return Err(TreeError::MainSurface(id));
        }
        Ok(self.remove_subtree(id))
    }

    /// Drop a view's main surface together with all its children
    pub fn destroy_main(&mut self, id: SurfaceId) -> Vec<SurfaceId> {
        self.remove_subtree(id)
    }

    fn remove_subtree(&mut self, id: SurfaceId) -> Vec<SurfaceId> {
        if let Some(parent) = self.surfaces.get(&id).and_then(|s| s.parent) {
            if let Some(p) = self.surfaces.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(surface) = self.surfaces.remove(&next) {
                pending.extend(surface.children);
                removed.push(next);
            }
        }
        debug!("Destroyed {} surface(s) rooted at {}", removed.len(), id);
        removed
    }

    /// Walk up through parents to the nearest main surface
    pub fn main_surface(&self, id: SurfaceId) -> Option<SurfaceId> {
        let mut current = self.surfaces.get(&id)?;
        // Depth is bounded by the number of surfaces
        for _ in 0..=self.surfaces.len() {
            if let SurfaceRole::Main { .. } = current.role {
                return Some(current.id);
            }
            current = self.surfaces.get(&current.parent?)?;
        }
        None
    }

    /// The view owning `id`'s main surface
    pub fn owning_view(&self, id: SurfaceId) -> Option<ViewId> {
        let main = self.main_surface(id)?;
        match self.surfaces.get(&main)?.role {
            SurfaceRole::Main { view } => Some(view),
            _ => None,
        }
    }

    /// Mapped surfaces below `root` (root excluded), parents before children
    pub fn mapped_descendants(&self, root: SurfaceId) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        let mut pending: Vec<SurfaceId> = self
            .surfaces
            .get(&root)
            .map(|s| s.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(id) = pending.pop() {
            let Some(surface) = self.surfaces.get(&id) else {
                continue;
            };
            if !surface.mapped {
                continue;
            }
            out.push(id);
            pending.extend(surface.children.iter().rev().copied());
        }
        out
    }

    /// Mapped popups below `root` that have not been dismissed yet
    pub fn live_popups(&self, root: SurfaceId) -> Vec<SurfaceId> {
        self.mapped_descendants(root)
            .into_iter()
            .filter(|id| {
                self.surfaces
                    .get(id)
                    .is_some_and(|s| s.role == SurfaceRole::Popup { done: false })
            })
            .collect()
    }

    /// Mark a popup as dismissed. Returns false if it is not a live, mapped
    /// popup.
    pub fn send_done(&mut self, id: SurfaceId) -> bool {
        match self.surfaces.get_mut(&id) {
            Some(surface) if surface.mapped && surface.role == (SurfaceRole::Popup { done: false }) => {
                surface.role = SurfaceRole::Popup { done: true };
                true
            }
            _ => false,
        }
    }

    /// Topmost mapped surface under `(x, y)`, for a tree whose root sits at
    /// `origin`. Children are tested before their parent, topmost first.
    pub fn surface_at(&self, root: SurfaceId, origin: Point, x: f64, y: f64) -> Option<SurfaceId> {
        let surface = self.surfaces.get(&root)?;
        if !surface.mapped {
            return None;
        }

        for child in surface.children.iter().rev() {
            let Some(offset) = self.surfaces.get(child).and_then(|c| c.offset()) else {
                continue;
            };
            if let Some(hit) = self.surface_at(*child, origin + offset, x, y) {
                return Some(hit);
            }
        }

        let rect = crate::types::Rectangle::from_loc_and_size(origin, surface.size);
        rect.contains(x, y).then_some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_main() -> (SurfaceTree, SurfaceId) {
        let mut tree = SurfaceTree::new();
        let main = tree.create_main(ViewId(1), (400, 300));
        tree.set_mapped(main, true).unwrap();
        (tree, main)
    }

    #[test]
    fn test_owning_view_walks_through_subsurfaces() {
        let (mut tree, main) = tree_with_main();
        let sub = tree
            .create_child(main, ChildKind::Subsurface, Point::new(10, 10), (50, 50))
            .unwrap();
        let popup = tree
            .create_child(sub, ChildKind::Popup, Point::new(5, 5), (20, 20))
            .unwrap();

        assert_eq!(tree.main_surface(popup), Some(main));
        assert_eq!(tree.owning_view(popup), Some(ViewId(1)));
        assert_eq!(tree.owning_view(SurfaceId(999)), None);
    }

    #[test]
    fn test_hit_test_survives_extreme_offsets() {
        let (mut tree, main) = tree_with_main();
        let far = tree
            .create_child(main, ChildKind::Subsurface, Point::new(i32::MAX - 1, 0), (50, 50))
            .unwrap();
        tree.set_mapped(far, true).unwrap();
        let nested = tree
            .create_child(far, ChildKind::Popup, Point::new(i32::MAX, 0), (10, 10))
            .unwrap();
        tree.set_mapped(nested, true).unwrap();

        assert_eq!(tree.surface_at(main, Point::new(10, 0), 20.0, 20.0), Some(main));
        assert_eq!(tree.surface_at(main, Point::new(10, 0), 1e12, 20.0), None);
    }

    #[test]
    fn test_offset_only_defined_while_mapped() {
        let (mut tree, main) = tree_with_main();
        let sub = tree
            .create_child(main, ChildKind::Subsurface, Point::new(3, 4), (10, 10))
            .unwrap();

        assert_eq!(tree.get(sub).unwrap().offset(), None);
        tree.set_mapped(sub, true).unwrap();
        assert_eq!(tree.get(sub).unwrap().offset(), Some(Point::new(3, 4)));
    }

    #[test]
    fn test_destroy_removes_child_from_parent() {
        let (mut tree, main) = tree_with_main();
        let sub = tree
            .create_child(main, ChildKind::Subsurface, Point::default(), (10, 10))
            .unwrap();
        let nested = tree
            .create_child(sub, ChildKind::Popup, Point::default(), (10, 10))
            .unwrap();

        let removed = tree.destroy(sub).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(tree.get(main).unwrap().children.is_empty());
        assert!(!tree.contains(nested));
        assert_eq!(tree.destroy(sub), Err(TreeError::UnknownSurface(sub)));
    }

    #[test]
    fn test_main_surface_cannot_be_destroyed_directly() {
        let (mut tree, main) = tree_with_main();
        assert_eq!(tree.destroy(main), Err(TreeError::MainSurface(main)));
    }

    #[test]
    fn test_live_popups_skip_unmapped_and_dismissed() {
        let (mut tree, main) = tree_with_main();
        let a = tree
            .create_child(main, ChildKind::Popup, Point::default(), (10, 10))
            .unwrap();
        let b = tree
            .create_child(main, ChildKind::Popup, Point::default(), (10, 10))
            .unwrap();
        let hidden = tree
            .create_child(main, ChildKind::Popup, Point::default(), (10, 10))
            .unwrap();
        tree.set_mapped(a, true).unwrap();
        tree.set_mapped(b, true).unwrap();

        assert_eq!(tree.live_popups(main), vec![a, b]);
        assert!(tree.send_done(a));
        assert!(!tree.send_done(a));
        assert!(!tree.send_done(hidden));
        assert_eq!(tree.live_popups(main), vec![b]);
    }

    #[test]
    fn test_unmapped_parent_hides_children() {
        let (mut tree, main) = tree_with_main();
        let sub = tree
            .create_child(main, ChildKind::Subsurface, Point::default(), (10, 10))
            .unwrap();
        let popup = tree
            .create_child(sub, ChildKind::Popup, Point::default(), (10, 10))
            .unwrap();
        tree.set_mapped(popup, true).unwrap();

        assert!(tree.mapped_descendants(main).is_empty());
        tree.set_mapped(sub, true).unwrap();
        assert_eq!(tree.mapped_descendants(main), vec![sub, popup]);
    }

    #[test]
    fn test_surface_at_prefers_topmost_child() {
        let (mut tree, main) = tree_with_main();
        let lower = tree
            .create_child(main, ChildKind::Subsurface, Point::new(10, 10), (100, 100))
            .unwrap();
        let upper = tree
            .create_child(main, ChildKind::Popup, Point::new(50, 50), (100, 100))
            .unwrap();
        tree.set_mapped(lower, true).unwrap();
        tree.set_mapped(upper, true).unwrap();

        let origin = Point::new(100, 100);
        assert_eq!(tree.surface_at(main, origin, 170.0, 170.0), Some(upper));
        assert_eq!(tree.surface_at(main, origin, 115.0, 115.0), Some(lower));
        assert_eq!(tree.surface_at(main, origin, 450.0, 350.0), Some(main));
        assert_eq!(tree.surface_at(main, origin, 50.0, 50.0), None);
    }
}
