// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal of the shape hierarchy.
//!
//! Downward: [`ShapeStore::sub_shapes`] collects the distinct sub-shapes of
//! one kind. Upward: [`ShapeStore::ancestors`] collects the distinct shapes
//! of one kind that contain a shape, restricted to a host.

use nalgebra::Point3;
use rustc_hash::FxHashSet;

use crate::keys::*;
use crate::store::ShapeStore;

impl ShapeStore {
    /// Immediate children of a shape. Vertices have none.
    pub fn children(&self, shape: Shape) -> Vec<Shape> {
        match shape {
            Shape::Vertex(_) => Vec::new(),
            Shape::Edge(k) => self
                .edges
                .get(k)
                .map(|e| {
                    if e.start == e.end {
                        vec![Shape::Vertex(e.start)]
                    } else {
                        vec![Shape::Vertex(e.start), Shape::Vertex(e.end)]
                    }
                })
                .unwrap_or_default(),
            Shape::Wire(k) => self
                .wires
                .get(k)
                .map(|w| w.edges.iter().map(|&e| Shape::Edge(e)).collect())
                .unwrap_or_default(),
            Shape::Face(k) => self
                .faces
                .get(k)
                .map(|f| {
                    std::iter::once(f.outer_wire)
                        .chain(f.inner_wires.iter().copied())
                        .map(Shape::Wire)
                        .collect()
                })
                .unwrap_or_default(),
            Shape::Shell(k) => self
                .shells
                .get(k)
                .map(|s| s.faces.iter().map(|&f| Shape::Face(f)).collect())
                .unwrap_or_default(),
            Shape::Solid(k) => self
                .solids
                .get(k)
                .map(|s| {
                    std::iter::once(s.outer_shell)
                        .chain(s.inner_shells.iter().copied())
                        .map(Shape::Shell)
                        .collect()
                })
                .unwrap_or_default(),
            Shape::CompSolid(k) => self
                .comp_solids
                .get(k)
                .map(|c| c.solids.iter().map(|&s| Shape::Solid(s)).collect())
                .unwrap_or_default(),
            Shape::Compound(k) => self
                .compounds
                .get(k)
                .map(|c| c.members.clone())
                .unwrap_or_default(),
        }
    }

    /// Distinct sub-shapes of `kind` in depth-first discovery order. The root
    /// itself is included when it has that kind.
    pub fn sub_shapes(&self, shape: Shape, kind: ShapeKind) -> Vec<Shape> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<Shape> = FxHashSet::default();
        let mut visited: FxHashSet<Shape> = FxHashSet::default();
        self.collect_sub_shapes(shape, kind, &mut out, &mut seen, &mut visited);
        out
    }

    fn collect_sub_shapes(
        &self,
        shape: Shape,
        kind: ShapeKind,
        out: &mut Vec<Shape>,
        seen: &mut FxHashSet<Shape>,
        visited: &mut FxHashSet<Shape>,
    ) {
        if !visited.insert(shape) {
            return;
        }
        if shape.kind() == kind && seen.insert(shape) {
            out.push(shape);
        }
        // Only compounds may hold shapes as coarse as themselves
        let descend = match kind {
            ShapeKind::Compound => shape.kind() == ShapeKind::Compound,
            _ => shape.kind() > kind,
        };
        if !descend {
            return;
        }
        for child in self.children(shape) {
            self.collect_sub_shapes(child, kind, out, seen, visited);
        }
    }

    /// Distinct shapes of `kind` inside `host` that contain `shape`.
    pub fn ancestors(&self, shape: Shape, host: Shape, kind: ShapeKind) -> Vec<Shape> {
        let mut candidates: FxHashSet<Shape> = FxHashSet::default();
        let mut stack = vec![shape];
        let mut visited: FxHashSet<Shape> = FxHashSet::default();
        while let Some(s) = stack.pop() {
            if !visited.insert(s) {
                continue;
            }
            for parent in self.parents(s) {
                if parent.kind() == kind {
                    candidates.insert(parent);
                }
                stack.push(parent);
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        self.sub_shapes(host, kind)
            .into_iter()
            .filter(|s| *s != shape && candidates.contains(s))
            .collect()
    }

    /// Returns `true` if `part` is `whole` or one of its sub-shapes.
    pub fn is_sub_shape(&self, part: Shape, whole: Shape) -> bool {
        part == whole || self.sub_shapes(whole, part.kind()).contains(&part)
    }

    /// Vertices of a wire in traversal order, each listed once.
    pub fn wire_vertices_ordered(&self, key: WireKey) -> Option<Vec<VertexKey>> {
        let wire = self.wires.get(key)?;
        let mut vertices = Vec::with_capacity(wire.edges.len() + 1);
        let mut seen: FxHashSet<VertexKey> = FxHashSet::default();

        for (i, &ek) in wire.edges.iter().enumerate() {
            let edge = self.edges.get(ek)?;
            let (a, b) = if wire.orientations[i] {
                (edge.start, edge.end)
            } else {
                (edge.end, edge.start)
            };
            for v in [a, b] {
                if seen.insert(v) {
                    vertices.push(v);
                }
            }
        }
        Some(vertices)
    }

    /// Points of a wire in traversal order.
    pub fn wire_points(&self, key: WireKey) -> Option<Vec<Point3<f64>>> {
        self.wire_vertices_ordered(key)?
            .into_iter()
            .map(|v| self.vertex_point(v))
            .collect()
    }

    /// Outer loop and hole loops of a face as points.
    pub fn face_loops(&self, key: FaceKey) -> Option<(Vec<Point3<f64>>, Vec<Vec<Point3<f64>>>)> {
        let face = self.faces.get(key)?;
        let outer = self.wire_points(face.outer_wire)?;
        let holes = face
            .inner_wires
            .iter()
            .map(|&w| self.wire_points(w))
            .collect::<Option<Vec<_>>>()?;
        Some((outer, holes))
    }

    /// Faces of `host` bounded by `edge`.
    pub fn edge_faces_within(&self, edge: EdgeKey, host: Shape) -> Vec<FaceKey> {
        self.ancestors(Shape::Edge(edge), host, ShapeKind::Face)
            .into_iter()
            .filter_map(|s| match s {
                Shape::Face(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_sub_shape_counts() {
        let mut store = ShapeStore::new();
        let (cell, _, _) = store.make_box([0.0; 3], [1.0; 3]).unwrap();
        let solid = Shape::Solid(cell);

        assert_eq!(store.sub_shapes(solid, ShapeKind::Vertex).len(), 8);
        assert_eq!(store.sub_shapes(solid, ShapeKind::Edge).len(), 12);
        assert_eq!(store.sub_shapes(solid, ShapeKind::Wire).len(), 6);
        assert_eq!(store.sub_shapes(solid, ShapeKind::Face).len(), 6);
        assert_eq!(store.sub_shapes(solid, ShapeKind::Shell).len(), 1);
        assert_eq!(store.sub_shapes(solid, ShapeKind::Solid), vec![solid]);
        assert!(store.sub_shapes(solid, ShapeKind::Compound).is_empty());
    }

    #[test]
    fn ancestors_are_restricted_to_host() {
        let mut store = ShapeStore::new();
        let complex = store
            .make_adjacent_boxes([0.0; 3], [1.0; 3], [1.0, 0.0, 0.0], [2.0, 1.0, 1.0], 1e-6)
            .unwrap();
        let host = Shape::CompSolid(complex);
        let faces = store.sub_shapes(host, ShapeKind::Face);
        assert_eq!(faces.len(), 11);

        let shared: Vec<_> = faces
            .iter()
            .filter(|f| store.ancestors(**f, host, ShapeKind::Solid).len() == 2)
            .collect();
        assert_eq!(shared.len(), 1);

        // Outside the host nothing is found
        let (other, _, _) = store.make_box([5.0; 3], [6.0; 3]).unwrap();
        assert!(store
            .ancestors(*shared[0], Shape::Solid(other), ShapeKind::Solid)
            .is_empty());
    }

    #[test]
    fn nested_compounds_are_explored() {
        let mut store = ShapeStore::new();
        let v = store.add_vertex(0.0, 0.0, 0.0);
        let inner = store.add_compound(&[Shape::Vertex(v)]).unwrap();
        let outer = store.add_compound(&[inner]).unwrap();

        assert_eq!(store.sub_shapes(outer, ShapeKind::Compound), vec![outer, inner]);
        assert_eq!(store.sub_shapes(outer, ShapeKind::Vertex), vec![Shape::Vertex(v)]);
        assert!(store.is_sub_shape(Shape::Vertex(v), outer));
    }

    #[test]
    fn wire_vertices_follow_traversal() {
        let mut store = ShapeStore::new();
        let a = store.add_vertex(0.0, 0.0, 0.0);
        let b = store.add_vertex(1.0, 0.0, 0.0);
        let c = store.add_vertex(1.0, 1.0, 0.0);
        let e0 = store.add_edge(b, a).unwrap();
        let e1 = store.add_edge(b, c).unwrap();
        let wire = store.add_wire(&[e0, e1]).unwrap();

        assert_eq!(store.wire_vertices_ordered(wire).unwrap(), vec![a, b, c]);
    }
}
