// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NMT Kernel
//!
//! Polyhedral boundary representation for the non-manifold topology layer.
//!
//! Shapes (vertices, edges, wires, faces, shells, solids, comp-solids and
//! compounds) live in slot maps inside a [`ShapeStore`] and are addressed by
//! the copyable [`Shape`] handle. Sub-shapes are shared by reference, so a
//! face can bound two solids and an edge can sit in any number of faces.
//! Every shape knows its direct parents, which keeps upward queries cheap.
//!
//! On top of the store the crate provides:
//!
//! - geometric queries: normals, areas, volumes, point classification and
//!   distances ([`geometry`]);
//! - structure-preserving copies with a full copy history ([`copy`]);
//! - a non-regular cell decomposition of any number of arguments into
//!   labelled pieces ([`CellsBuilder`]), the engine behind all booleans;
//! - regular `fuse`, `common` and `section` ([`boolean`]);
//! - volume making from loose faces ([`volumes`]);
//! - JSON snapshots of a shape tree ([`serialization`]).
//!
//! Solid booleans run on [csgrs](https://crates.io/crates/csgrs) BSP trees;
//! coplanar face overlays run on
//! [i_overlay](https://crates.io/crates/i_overlay). Results are sewn back
//! into shared topology with a tolerance-based [`Sewer`].

pub mod boolean;
pub mod builders;
pub mod cells;
pub mod construction;
pub mod copy;
pub mod error;
pub mod explore;
pub mod geometry;
pub mod heal;
pub mod keys;
pub mod mesh;
pub mod planar;
pub mod serialization;
pub mod spatial;
pub mod store;
pub mod volumes;

pub use cells::{CellsBuilder, Labels};
pub use copy::CopyHistory;
pub use error::{KernelError, Result};
pub use geometry::{Location, Triangle};
pub use keys::{
    CompSolidKey, CompoundKey, EdgeKey, FaceKey, Shape, ShapeKind, ShellKey, SolidKey, VertexKey,
    WireKey,
};
pub use planar::PlaneFrame;
pub use spatial::Sewer;
pub use store::ShapeStore;
pub use volumes::Volumes;
