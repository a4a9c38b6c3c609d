// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shape handles for arena-based storage.
//!
//! Every shape lives in a per-kind slot map and is addressed by a
//! generational key. [`Shape`] wraps those keys into one `Copy` handle whose
//! equality, ordering and hash are the identity used by every registry built
//! on top of the kernel.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a vertex (point in 3D space).
    pub struct VertexKey;

    /// Key for an edge (line segment between two vertices).
    pub struct EdgeKey;

    /// Key for a wire (connected set of edges, possibly branching).
    pub struct WireKey;

    /// Key for a face (planar region bounded by wires).
    pub struct FaceKey;

    /// Key for a shell (connected set of faces).
    pub struct ShellKey;

    /// Key for a solid (volume bounded by an outer shell and void shells).
    pub struct SolidKey;

    /// Key for a comp-solid (solids glued along shared faces).
    pub struct CompSolidKey;

    /// Key for a compound (arbitrary collection of shapes).
    pub struct CompoundKey;
}

/// A handle to any shape in a [`ShapeStore`](crate::ShapeStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Vertex(VertexKey),
    Edge(EdgeKey),
    Wire(WireKey),
    Face(FaceKey),
    Shell(ShellKey),
    Solid(SolidKey),
    CompSolid(CompSolidKey),
    Compound(CompoundKey),
}

impl Shape {
    /// Returns the kind tag of this shape.
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Vertex(_) => ShapeKind::Vertex,
            Shape::Edge(_) => ShapeKind::Edge,
            Shape::Wire(_) => ShapeKind::Wire,
            Shape::Face(_) => ShapeKind::Face,
            Shape::Shell(_) => ShapeKind::Shell,
            Shape::Solid(_) => ShapeKind::Solid,
            Shape::CompSolid(_) => ShapeKind::CompSolid,
            Shape::Compound(_) => ShapeKind::Compound,
        }
    }
}

/// Kind tag of a shape, ordered from finest to coarsest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ShapeKind {
    Vertex = 0,
    Edge = 1,
    Wire = 2,
    Face = 3,
    Shell = 4,
    Solid = 5,
    CompSolid = 6,
    Compound = 7,
}

impl ShapeKind {
    /// All kinds, finest first.
    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Vertex,
        ShapeKind::Edge,
        ShapeKind::Wire,
        ShapeKind::Face,
        ShapeKind::Shell,
        ShapeKind::Solid,
        ShapeKind::CompSolid,
        ShapeKind::Compound,
    ];

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Vertex => "Vertex",
            ShapeKind::Edge => "Edge",
            ShapeKind::Wire => "Wire",
            ShapeKind::Face => "Face",
            ShapeKind::Shell => "Shell",
            ShapeKind::Solid => "Solid",
            ShapeKind::CompSolid => "CompSolid",
            ShapeKind::Compound => "Compound",
        }
    }

    /// Geometric dimension of shapes of this kind. Compounds report 3 as an
    /// upper bound.
    pub fn dimension(&self) -> u8 {
        match self {
            ShapeKind::Vertex => 0,
            ShapeKind::Edge | ShapeKind::Wire => 1,
            ShapeKind::Face | ShapeKind::Shell => 2,
            ShapeKind::Solid | ShapeKind::CompSolid | ShapeKind::Compound => 3,
        }
    }

    /// `true` for kinds that only group other shapes: wires, shells,
    /// comp-solids and compounds.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ShapeKind::Wire | ShapeKind::Shell | ShapeKind::CompSolid | ShapeKind::Compound
        )
    }

    /// Kinds strictly finer than this one, finest first.
    pub fn finer(&self) -> impl Iterator<Item = ShapeKind> {
        let limit = *self;
        Self::ALL.into_iter().filter(move |k| *k < limit)
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VertexKey> for Shape {
    fn from(k: VertexKey) -> Self {
        Shape::Vertex(k)
    }
}

impl From<EdgeKey> for Shape {
    fn from(k: EdgeKey) -> Self {
        Shape::Edge(k)
    }
}

impl From<WireKey> for Shape {
    fn from(k: WireKey) -> Self {
        Shape::Wire(k)
    }
}

impl From<FaceKey> for Shape {
    fn from(k: FaceKey) -> Self {
        Shape::Face(k)
    }
}

impl From<ShellKey> for Shape {
    fn from(k: ShellKey) -> Self {
        Shape::Shell(k)
    }
}

impl From<SolidKey> for Shape {
    fn from(k: SolidKey) -> Self {
        Shape::Solid(k)
    }
}

impl From<CompSolidKey> for Shape {
    fn from(k: CompSolidKey) -> Self {
        Shape::CompSolid(k)
    }
}

impl From<CompoundKey> for Shape {
    fn from(k: CompoundKey) -> Self {
        Shape::Compound(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ordering_is_fine_to_coarse() {
        assert!(ShapeKind::Vertex < ShapeKind::Edge);
        assert!(ShapeKind::Edge < ShapeKind::Wire);
        assert!(ShapeKind::Face < ShapeKind::Shell);
        assert!(ShapeKind::Solid < ShapeKind::CompSolid);
        assert!(ShapeKind::CompSolid < ShapeKind::Compound);
    }

    #[test]
    fn finer_kinds_exclude_self() {
        let finer: Vec<_> = ShapeKind::Face.finer().collect();
        assert_eq!(
            finer,
            vec![ShapeKind::Vertex, ShapeKind::Edge, ShapeKind::Wire]
        );
        assert_eq!(ShapeKind::Vertex.finer().count(), 0);
    }

    #[test]
    fn container_kinds() {
        let containers: Vec<_> = ShapeKind::ALL
            .iter()
            .copied()
            .filter(ShapeKind::is_container)
            .collect();
        assert_eq!(
            containers,
            vec![
                ShapeKind::Wire,
                ShapeKind::Shell,
                ShapeKind::CompSolid,
                ShapeKind::Compound
            ]
        );
    }

    #[test]
    fn dimensions() {
        assert_eq!(ShapeKind::Vertex.dimension(), 0);
        assert_eq!(ShapeKind::Wire.dimension(), 1);
        assert_eq!(ShapeKind::Shell.dimension(), 2);
        assert_eq!(ShapeKind::CompSolid.dimension(), 3);
        assert_eq!(ShapeKind::Solid.to_string(), "Solid");
    }
}
