// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed entity wrappers.
//!
//! Each structural kind has a thin wrapper around a [`Topology`] that also
//! carries the typed kernel key, so kind-specific queries need no runtime
//! checks. Wrappers convert into [`Topology`] for free; the way back goes
//! through [`Entity::try_from_topology`].

use nmt_kernel::{
    CompSolidKey, CompoundKey, EdgeKey, FaceKey, Shape, ShapeKind, ShellKey, SolidKey, VertexKey,
    WireKey,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keys::{self, TopologyType};
use crate::topology::Topology;

/// Common interface of the typed wrappers.
pub trait Entity: Copy + Into<Topology> {
    const TYPE: TopologyType;
    const CLASS_GUID: Uuid;
    const SHAPE_KIND: ShapeKind;

    fn topology(&self) -> Topology;

    /// Views a topology as this kind. Extension classes over the right shape
    /// kind are accepted.
    fn try_from_topology(topology: Topology) -> Result<Self>;

    fn shape(&self) -> Shape {
        self.topology().shape()
    }
}

macro_rules! entity {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $key:ty, $class:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            topology: Topology,
            key: $key,
        }

        impl $name {
            /// Kernel key of the wrapped shape.
            pub fn key(&self) -> $key {
                self.key
            }
        }

        impl Entity for $name {
            const TYPE: TopologyType = TopologyType::$name;
            const CLASS_GUID: Uuid = $class;
            const SHAPE_KIND: ShapeKind = ShapeKind::$variant;

            fn topology(&self) -> Topology {
                self.topology
            }

            fn try_from_topology(topology: Topology) -> Result<Self> {
                match topology.shape() {
                    Shape::$variant(key) => Ok(Self { topology, key }),
                    _ => Err(Error::WrongKind {
                        expected: TopologyType::$name,
                        found: topology.kind(),
                    }),
                }
            }
        }

        impl From<$name> for Topology {
            fn from(entity: $name) -> Topology {
                entity.topology
            }
        }

        impl TryFrom<Topology> for $name {
            type Error = Error;

            fn try_from(topology: Topology) -> Result<Self> {
                <$name as Entity>::try_from_topology(topology)
            }
        }
    };
}

entity!(
    /// A point.
    Vertex, Vertex, VertexKey, keys::VERTEX_CLASS
);
entity!(
    /// A straight segment between two vertices.
    Edge, Edge, EdgeKey, keys::EDGE_CLASS
);
entity!(
    /// A connected set of edges, open, closed or branching.
    Wire, Wire, WireKey, keys::WIRE_CLASS
);
entity!(
    /// A planar region bounded by an outer wire and optional holes.
    Face, Face, FaceKey, keys::FACE_CLASS
);
entity!(
    /// A connected set of faces.
    Shell, Shell, ShellKey, keys::SHELL_CLASS
);
entity!(
    /// A volume bounded by an outer shell and optional voids.
    Cell, Solid, SolidKey, keys::CELL_CLASS
);
entity!(
    /// Cells glued along shared faces.
    CellComplex, CompSolid, CompSolidKey, keys::CELL_COMPLEX_CLASS
);
entity!(
    /// Any collection of topologies.
    Cluster, Compound, CompoundKey, keys::CLUSTER_CLASS
);
