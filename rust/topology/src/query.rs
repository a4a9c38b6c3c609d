// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sub-topology selection, membership queries and the text analysis report.
//!
//! Nearest-sub-shape selection is the matching primitive behind dictionary
//! transfer and content placement: shapes of the requested kinds are scanned
//! from the coarsest kind to the finest, and within the kernel tolerance a
//! finer shape wins a tie.

use std::fmt::Write;

use nalgebra::Point3;
use nmt_kernel::{Shape, ShapeKind};
use rustc_hash::FxHashSet;

use crate::entities::Vertex;
use crate::error::Result;
use crate::keys::{TopologyType, TypeFilter};
use crate::model::Model;
use crate::topology::Topology;

const RULE: &str = "================";

impl Model {
    /// Nearest shape under `root` of a kind in `filter`, if it lies closer
    /// than `threshold` to `point`.
    pub(crate) fn select_sub_shape(
        &self,
        root: Shape,
        point: &Point3<f64>,
        filter: TypeFilter,
        threshold: f64,
    ) -> Option<Shape> {
        let tolerance = self.config.tolerance;
        let kinds: Vec<TopologyType> = filter.kinds().collect();
        let mut best: Option<(Shape, f64)> = None;

        for ty in kinds.iter().rev() {
            for sub in self.store.sub_shapes(root, ty.shape_kind()) {
                let Some(distance) = self.store.distance_to_point(sub, point) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((current, min)) => {
                        distance < min
                            || (distance <= min + tolerance && sub.kind() < current.kind())
                    }
                };
                if better {
                    best = Some((sub, distance));
                }
            }
        }

        best.filter(|&(_, distance)| distance < threshold)
            .map(|(shape, _)| shape)
    }

    /// Sub-topology of `topology` nearest to `selector`, among the vertex,
    /// edge, face and cell kinds in `filter`.
    pub fn select_sub_topology(
        &mut self,
        topology: Topology,
        selector: Vertex,
        filter: TypeFilter,
    ) -> Result<Option<Topology>> {
        let point = self.vertex_point(selector)?;
        let pick = self.select_sub_shape(
            topology.shape(),
            &point,
            filter & TypeFilter::SELECTABLE,
            f64::MAX,
        );
        Ok(pick.map(|shape| self.wrap(shape)))
    }

    /// Simplest sub-topology of `topology` nearest to `query`: the vertex,
    /// edge, face or cell closest to the query's centre of mass.
    pub fn closest_simplest_subshape(
        &mut self,
        topology: Topology,
        query: Topology,
    ) -> Result<Option<Topology>> {
        let point = self.center_of_mass(query)?;
        let pick = self.select_sub_shape(topology.shape(), &point, TypeFilter::SELECTABLE, f64::MAX);
        Ok(pick.map(|shape| self.wrap(shape)))
    }

    /// Sub-topologies of the kinds in `filter` that `a` and `b` both contain.
    pub fn shared_topologies(&mut self, a: Topology, b: Topology, filter: TypeFilter) -> Vec<Topology> {
        let mut shared = Vec::new();
        for ty in filter.kinds() {
            let kind = ty.shape_kind();
            let in_b: FxHashSet<Shape> = self.store.sub_shapes(b.shape(), kind).into_iter().collect();
            shared.extend(
                self.store
                    .sub_shapes(a.shape(), kind)
                    .into_iter()
                    .filter(|s| in_b.contains(s)),
            );
        }
        self.wrap_all(shared)
    }

    /// Immediate children: the members a compound or container is built
    /// from, the boundary of a cell or face, the ends of an edge.
    pub fn sub_topologies(&mut self, topology: Topology) -> Vec<Topology> {
        let children = self.store.children(topology.shape());
        self.wrap_all(children)
    }

    pub fn num_sub_topologies(&self, topology: Topology) -> usize {
        self.store.children(topology.shape()).len()
    }

    /// Every distinct shape of a finer kind below `topology`, coarsest kind
    /// first.
    pub fn members(&mut self, topology: Topology) -> Vec<Topology> {
        let shape = topology.shape();
        let kinds: Vec<ShapeKind> = shape.kind().finer().collect();
        let mut out = Vec::new();
        for &kind in kinds.iter().rev() {
            out.extend(self.store.sub_shapes(shape, kind));
        }
        self.wrap_all(out)
    }

    /// A human-readable breakdown of the shape tree: totals first, then one
    /// indented block per member.
    pub fn analyze(&self, topology: Topology) -> String {
        let shape = topology.shape();
        let mut out = String::new();
        let _ = writeln!(out, "OVERALL ANALYSIS");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "The shape is {}.", singular(shape.kind()));

        let totals = [
            (ShapeKind::CompSolid, "cell complexes"),
            (ShapeKind::Solid, "cells"),
            (ShapeKind::Shell, "shells"),
            (ShapeKind::Face, "faces"),
            (ShapeKind::Wire, "wires"),
            (ShapeKind::Edge, "edges"),
            (ShapeKind::Vertex, "vertices"),
        ];
        for (kind, name) in totals {
            if kind < shape.kind() {
                let count = self.store.sub_shapes(shape, kind).len();
                let _ = writeln!(out, "Number of {name} = {count}");
            }
        }

        let _ = write!(out, "\n\nINDIVIDUAL ANALYSIS\n{RULE}\n");
        self.analyze_level(shape, 0, &mut out);
        out
    }

    fn analyze_level(&self, shape: Shape, level: usize, out: &mut String) {
        let indent = "  ".repeat(level);
        let children = self.store.children(shape);
        let _ = writeln!(out, "{indent}The shape is {}.", singular(shape.kind()));

        for kind in ShapeKind::ALL.iter().rev().copied() {
            if kind >= shape.kind() {
                continue;
            }
            let count = children.iter().filter(|c| c.kind() == kind).count();
            if count > 0 {
                let _ = writeln!(out, "{indent}Number of {} = {count}", plural(kind));
            }
        }
        let _ = writeln!(out, "{indent}{RULE}");

        for child in children {
            self.analyze_level(child, level + 1, out);
        }
    }
}

impl Topology {
    /// Topologies of `list` whose kind is in `filter`.
    pub fn filter(list: &[Topology], filter: TypeFilter) -> Vec<Topology> {
        list.iter()
            .filter(|t| filter.contains(t.kind()))
            .copied()
            .collect()
    }
}

fn singular(kind: ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Compound => "a cluster",
        ShapeKind::CompSolid => "a cellComplex",
        ShapeKind::Solid => "a cell",
        ShapeKind::Shell => "a shell",
        ShapeKind::Face => "a face",
        ShapeKind::Wire => "a wire",
        ShapeKind::Edge => "an edge",
        ShapeKind::Vertex => "a vertex",
    }
}

fn plural(kind: ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Compound => "clusters",
        ShapeKind::CompSolid => "cellComplexes",
        ShapeKind::Solid => "cells",
        ShapeKind::Shell => "shells",
        ShapeKind::Face => "faces",
        ShapeKind::Wire => "wires",
        ShapeKind::Edge => "edges",
        ShapeKind::Vertex => "vertices",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;

    #[test]
    fn selection_prefers_the_finer_kind_on_ties() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let corner = model.vertex_by_coordinates(1.0, 1.0, 1.0).unwrap();

        let pick = model
            .select_sub_topology(cell, corner, TypeFilter::SELECTABLE)
            .unwrap()
            .unwrap();
        assert_eq!(pick.kind(), TopologyType::Vertex);

        let mid_face = model.vertex_by_coordinates(0.5, 0.5, 1.2).unwrap();
        let pick = model
            .select_sub_topology(cell, mid_face, TopologyType::Face | TopologyType::Edge)
            .unwrap()
            .unwrap();
        assert_eq!(pick.kind(), TopologyType::Face);
    }

    #[test]
    fn selection_respects_threshold() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let far = Point3::new(5.0, 0.5, 0.5);
        let filter = TypeFilter::from(TopologyType::Face);
        assert!(model.select_sub_shape(cell.shape(), &far, filter, 1e-4).is_none());
        assert!(model.select_sub_shape(cell.shape(), &far, filter, 10.0).is_some());
    }

    #[test]
    fn adjacent_cells_share_one_face() {
        let mut model = Model::new();
        let a = model.cell_box([0.0; 3], [1.0; 3]).unwrap();
        let b = model.cell_box([1.0, 0.0, 0.0], [2.0, 1.0, 1.0]).unwrap();
        let complex = model.cell_complex_by_cells(&[a, b]).unwrap();
        let cells = model.cells(complex.topology(), None).unwrap();
        assert_eq!(cells.len(), 2);

        let shared = model.shared_topologies(
            cells[0].topology(),
            cells[1].topology(),
            TopologyType::Face.into(),
        );
        assert_eq!(shared.len(), 1);
        let shared_vertices = model.shared_topologies(
            cells[0].topology(),
            cells[1].topology(),
            TopologyType::Vertex.into(),
        );
        assert_eq!(shared_vertices.len(), 4);
    }

    #[test]
    fn members_and_sub_topologies() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let children = model.sub_topologies(cell);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind(), TopologyType::Shell);

        let members = model.members(cell);
        // shell + 6 faces + 6 wires + 12 edges + 8 vertices
        assert_eq!(members.len(), 33);
        assert_eq!(members[0].kind(), TopologyType::Shell);

        let faces = Topology::filter(&members, TopologyType::Face.into());
        assert_eq!(faces.len(), 6);
    }

    #[test]
    fn analysis_report() {
        let mut model = Model::new();
        let cell = model.cell_box([0.0; 3], [1.0; 3]).unwrap().topology();
        let report = model.analyze(cell);
        assert!(report.starts_with("OVERALL ANALYSIS\n================\nThe shape is a cell.\n"));
        assert!(report.contains("Number of shells = 1\nNumber of faces = 6\n"));
        assert!(report.contains("Number of vertices = 8\n"));
        assert!(report.contains("\n\nINDIVIDUAL ANALYSIS\n================\nThe shape is a cell.\n"));
        assert!(report.contains("\n  The shape is a shell.\n  Number of faces = 6\n"));
        assert!(report.contains("\n        The shape is an edge.\n        Number of vertices = 2\n"));
    }
}
