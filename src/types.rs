//! Shared identifiers and geometry primitives
//!
//! Every object the core tracks is referred to by a small copyable id.
//! Ids are never reused within a process, so a stale id simply fails the
//! liveness lookup instead of aliasing a newer object.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A display output managed by the display layer
    OutputId,
    "output"
);
id_type!(
    /// A toplevel or transient window
    ViewId,
    "view"
);
id_type!(
    /// Paintable content, either a view's main surface or a child of one
    SurfaceId,
    "surface"
);
id_type!(
    /// A loaded plugin instance
    PluginId,
    "plugin"
);
id_type!(SubscriptionId, "sub");
id_type!(IdleHandle, "idle");
id_type!(TimerId, "timer");
id_type!(BindingId, "binding");

/// Monotonic id allocator shared by all registries
#[derive(Debug, Clone)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer point in output-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

/// Rectangle for view positioning and sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_loc_and_size(loc: Point, (width, height): (u32, u32)) -> Self {
        Self::new(loc.x, loc.y, width, height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Half-open containment: the right and bottom edges are outside
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && y >= self.y as f64
            && x < self.x as f64 + self.width as f64
            && y < self.y as f64 + self.height as f64
    }
}
