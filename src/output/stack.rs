//! View Z-ordering stack
//!
//! Views are stored bottom to top: index 0 is the bottom-most view and the
//! last entry is the top-most one.

use std::collections::HashMap;

use crate::types::ViewId;

/// Manages the Z-ordering of views on one output.
///
/// # Examples
///
/// ```
/// use axiom_shell::output::stack::ViewStack;
/// use axiom_shell::types::ViewId;
///
/// let mut stack = ViewStack::new();
/// stack.push(ViewId(1));
/// stack.push(ViewId(2));
///
/// assert_eq!(stack.top(), Some(ViewId(2)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewStack {
    /// Views ordered from bottom to top
    views: Vec<ViewId>,

    /// Fast lookup: view ID → position in stack
    positions: HashMap<ViewId, usize>,
}

impl ViewStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a view to the top of the stack.
    ///
    /// Returns `false` if the view was already present.
    pub fn push(&mut self, view: ViewId) -> bool {
        if self.positions.contains_key(&view) {
            return false;
        }

        self.positions.insert(view, self.views.len());
        self.views.push(view);
        true
    }

    /// Removes a view, returning its previous position
    pub fn remove(&mut self, view: ViewId) -> Option<usize> {
        let pos = self.positions.remove(&view)?;
        self.views.remove(pos);
        self.rebuild_positions();
        Some(pos)
    }

    /// Raises a view to the top of the stack.
    ///
    /// Returns `false` if it wasn't in the stack.
    pub fn raise_to_top(&mut self, view: ViewId) -> bool {
        if self.remove(view).is_some() {
            self.push(view);
            true
        } else {
            false
        }
    }

    /// Places `view` immediately above `above`.
    ///
    /// Returns `false` if either view is missing or they are the same view.
    pub fn raise_above(&mut self, view: ViewId, above: ViewId) -> bool {
        if view == above || !self.positions.contains_key(&above) {
            return false;
        }

        if self.remove(view).is_none() {
            return false;
        }

        // The target may have shifted after removal
        let new_pos = self.positions.get(&above).map(|&p| p + 1).unwrap_or(0);
        self.views.insert(new_pos, view);
        self.rebuild_positions();
        true
    }

    /// Views in bottom-to-top order
    pub fn render_order(&self) -> &[ViewId] {
        &self.views
    }

    /// Views in top-to-bottom order, the order input is routed in
    pub fn iter_top_down(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.iter().rev().copied()
    }

    pub fn top(&self) -> Option<ViewId> {
        self.views.last().copied()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.positions.contains_key(&view)
    }

    /// Position 0 is the bottom-most view
    pub fn position(&self, view: ViewId) -> Option<usize> {
        self.positions.get(&view).copied()
    }

    fn rebuild_positions(&mut self) {
        self.positions.clear();
        for (i, &view) in self.views.iter().enumerate() {
            self.positions.insert(view, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(id: u64) -> ViewId {
        ViewId(id)
    }

    #[test]
    fn test_push_adds_to_top() {
        let mut stack = ViewStack::new();
        assert!(stack.push(v(1)));
        assert!(stack.push(v(2)));
        assert!(stack.push(v(3)));

        assert_eq!(stack.top(), Some(v(3)));
        assert_eq!(stack.render_order(), &[v(1), v(2), v(3)]);
        assert_eq!(stack.iter_top_down().collect::<Vec<_>>(), vec![v(3), v(2), v(1)]);
    }

    #[test]
    fn test_push_duplicate_is_noop() {
        let mut stack = ViewStack::new();
        assert!(stack.push(v(1)));
        assert!(!stack.push(v(1)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_remove_view() {
        let mut stack = ViewStack::new();
        stack.push(v(1));
        stack.push(v(2));
        stack.push(v(3));

        assert_eq!(stack.remove(v(2)), Some(1));
        assert_eq!(stack.render_order(), &[v(1), v(3)]);
        assert_eq!(stack.remove(v(99)), None);
    }

    #[test]
    fn test_raise_to_top() {
        let mut stack = ViewStack::new();
        stack.push(v(1));
        stack.push(v(2));
        stack.push(v(3));

        assert!(stack.raise_to_top(v(1)));
        assert_eq!(stack.render_order(), &[v(2), v(3), v(1)]);
        assert_eq!(stack.position(v(1)), Some(2));
        assert!(!stack.raise_to_top(v(99)));
    }

    #[test]
    fn test_raise_above() {
        let mut stack = ViewStack::new();
        stack.push(v(1));
        stack.push(v(2));
        stack.push(v(3));

        assert!(stack.raise_above(v(3), v(1)));
        assert_eq!(stack.render_order(), &[v(1), v(3), v(2)]);

        assert!(stack.raise_above(v(1), v(2)));
        assert_eq!(stack.render_order(), &[v(3), v(2), v(1)]);

        assert!(!stack.raise_above(v(1), v(1)));
        assert!(!stack.raise_above(v(1), v(99)));
    }
}
