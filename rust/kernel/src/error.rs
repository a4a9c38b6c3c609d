// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for kernel operations.

use crate::keys::Shape;

/// Result type alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur during kernel operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// A referenced shape was not found in the store.
    #[error("shape not found: {0:?}")]
    NotFound(Shape),

    /// A wire must have at least one edge.
    #[error("wire must have at least one edge")]
    EmptyWire,

    /// Edges in a wire do not form a connected set.
    #[error("wire edges are not connected: edge {0} cannot be reached from edge {1}")]
    DisconnectedWire(usize, usize),

    /// A face boundary wire is not a closed loop.
    #[error("face boundary wire is not closed")]
    OpenWire,

    /// A face boundary has fewer than 3 edges or zero area.
    #[error("face is degenerate: boundary has fewer than 3 edges or no area")]
    DegenerateFace,

    /// A shell must have at least one face.
    #[error("shell must have at least one face")]
    EmptyShell,

    /// The faces of a shell do not bound a volume.
    #[error("faces do not bound a solid: {0} boundary edges remain")]
    OpenShell(usize),

    /// A comp-solid must have at least one solid.
    #[error("comp-solid must have at least one solid")]
    EmptyCompSolid,

    /// The arguments are outside what the decomposition supports.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The decomposition reported errors; the text is the builder's report.
    #[error("{0}")]
    Decomposition(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
