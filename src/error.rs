//! Typed errors for view and surface tree mutations
//!
//! The core treats every one of these as advisory: the request simply does
//! not happen and the reason is logged.

use thiserror::Error;

use crate::types::{SurfaceId, ViewId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("{0} does not exist")]
    UnknownView(ViewId),

    #[error("{0} does not exist")]
    UnknownSurface(SurfaceId),

    #[error("{0} cannot be its own parent")]
    SelfParent(ViewId),

    #[error("making {parent} the parent of {child} would create a cycle")]
    Cycle { child: ViewId, parent: ViewId },

    #[error("{0} is a main surface and cannot be destroyed on its own")]
    MainSurface(SurfaceId),
}
