//! # Axiom Shell Core
//!
//! Plugin activation arbitration and view focus routing for a modular,
//! single-threaded window-compositing shell.
//!
//! ## Architecture
//!
//! - `signal`: publish/subscribe bus with revocable subscriptions
//! - `arbiter`: per-output exclusive capability tokens
//! - `scheduler`: run-once idle tasks and logical-clock timers
//! - `view`, `surface`, `output`: the window hierarchy and per-output state
//! - `input`: normalized device events, modifiers and activator bindings
//! - `compositor`: the [`Core`] owning all of the above and dispatching to plugins
//! - `plugins`: focus, focus-parent, command, close, exit and decoration
//! - `config`: TOML configuration
//!
//! ## Usage
//!
//! ```rust
//! use axiom_shell::{Core, HeadlessBackend, Rectangle, ShellConfig, ViewRole};
//!
//! let mut core = Core::new(ShellConfig::default(), Box::new(HeadlessBackend::new()));
//! let output = core.add_output("HEADLESS-1", Rectangle::new(0, 0, 1920, 1080));
//! core.load_configured_plugins(output);
//!
//! let view = core.create_view("terminal", ViewRole::Toplevel, Rectangle::new(0, 0, 800, 600));
//! core.set_view_output(view, Some(output));
//! core.map_view(view);
//! core.focus_view(output, Some(view));
//!
//! assert_eq!(core.output(output).unwrap().focused_view(), Some(view));
//! ```

pub mod arbiter;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod plugins;
pub mod scheduler;
pub mod signal;
pub mod surface;
pub mod types;
pub mod view;

// Re-export main types for easy access
pub use arbiter::{ActivationFlags, Arbiter, Capability};
pub use backend::{HeadlessBackend, ShellBackend};
pub use compositor::{Core, Leaks, Task};
pub use config::ShellConfig;
pub use output::{FocusState, Output};
pub use plugins::{Plugin, PluginHandle};
pub use signal::{Scope, Signal, SignalData};
pub use surface::ChildKind;
pub use types::{OutputId, Point, Rectangle, SurfaceId, ViewId};
pub use view::ViewRole;

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information for Axiom Shell
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
