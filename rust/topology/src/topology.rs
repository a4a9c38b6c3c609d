// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The untyped topology handle.
//!
//! A [`Topology`] pairs one raw kernel shape with the entity kind and class
//! it was wrapped as. Handles are plain values: two handles over the same
//! shape share every registry entry, because the registries are keyed by
//! the shape alone.

use nmt_kernel::Shape;
use uuid::Uuid;

use crate::keys::TopologyType;

/// A wrapped kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topology {
    shape: Shape,
    ty: TopologyType,
    class: Uuid,
}

impl Topology {
    /// Wraps `shape` as its default entity kind. Registration with a model
    /// happens through [`Model::by_shape`](crate::Model::by_shape).
    pub(crate) fn new(shape: Shape, ty: TopologyType, class: Uuid) -> Self {
        Self { shape, ty, class }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Entity kind this shape was wrapped as.
    pub fn kind(&self) -> TopologyType {
        self.ty
    }

    /// Class identity the wrapper was created under.
    pub fn class_guid(&self) -> Uuid {
        self.class
    }

    /// Dimensionality of the wrapped shape, 0 to 3.
    pub fn dimensionality(&self) -> u8 {
        self.shape.kind().dimension()
    }

    /// `true` for wires, shells, cell complexes and clusters. Extension
    /// kinds answer for the shape they wrap.
    pub fn is_container(&self) -> bool {
        TopologyType::from_shape_kind(self.shape.kind()).is_container()
    }

    /// Structural kind of the wrapped shape, ignoring extension classes.
    pub fn structural_kind(&self) -> TopologyType {
        TopologyType::from_shape_kind(self.shape.kind())
    }

    pub fn type_as_string(&self) -> &'static str {
        self.ty.as_str()
    }

    /// `true` when both handles wrap the same kernel shape.
    pub fn is_same(&self, other: &Topology) -> bool {
        self.shape == other.shape
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.ty, self.shape)
    }
}
