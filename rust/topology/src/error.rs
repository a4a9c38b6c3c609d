// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for topology operations.

use nmt_kernel::{KernelError, Shape};

use crate::keys::TopologyType;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during topology operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A required argument is missing or out of range.
    #[error("{0}")]
    Precondition(String),

    /// The kernel rejected a construction or a decomposition failed. The
    /// kernel's diagnostic text is kept as is.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// A shape was handed out by the model without an instance identity.
    #[error("shape has no instance identity: {0:?}")]
    UnregisteredShape(Shape),

    /// A topology could not be viewed as the requested entity kind.
    #[error("expected a {expected}, found a {found}")]
    WrongKind {
        expected: TopologyType,
        found: TopologyType,
    },

    /// Two selectors picked the same sub-topology.
    #[error("Another selector has selected the same member of the input Topology.")]
    SelectorConflict,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }
}
