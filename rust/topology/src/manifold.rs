// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manifoldness checks.
//!
//! Vertices, edges and faces are judged by their neighbourhood inside a
//! host (the aggregate when none is given). Wires, shells, cells, cell
//! complexes and clusters are judged on their own structure.

use nmt_kernel::{Shape, ShapeKind};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::Result;
use crate::keys::TopologyType;
use crate::model::Model;
use crate::topology::Topology;

impl Model {
    /// `true` when `topology` is manifold:
    ///
    /// - vertex: its faces form one fan around it, each of its edges bounding
    ///   at most two faces; with no faces, at most two edges meet at it;
    /// - edge: at most two faces meet at it; with no faces, it sits in at
    ///   most two wires;
    /// - face: at most one cell is bounded by it;
    /// - wire: no vertex joins more than two of its edges;
    /// - shell: no edge joins more than two of its faces;
    /// - cell: every edge joins exactly two faces of the cell;
    /// - cell complex: no face is shared between cells;
    /// - cluster: every member is manifold and no two members share a
    ///   vertex.
    pub fn is_manifold(&self, topology: Topology, host: Option<Topology>) -> Result<bool> {
        let shape = topology.shape();
        self.store.ensure(shape)?;
        let host = match host {
            Some(h) => {
                self.store.ensure(h.shape())?;
                h.shape()
            }
            None => self.aggregate.map(Shape::Compound).unwrap_or(shape),
        };

        let manifold = match shape.kind() {
            ShapeKind::Vertex => self.vertex_is_manifold(shape, host),
            ShapeKind::Edge => {
                let faces = self.store.ancestors(shape, host, ShapeKind::Face).len();
                if faces > 0 {
                    faces <= 2
                } else {
                    self.store.ancestors(shape, host, ShapeKind::Wire).len() <= 2
                }
            }
            ShapeKind::Face => self.store.ancestors(shape, host, ShapeKind::Solid).len() <= 1,
            ShapeKind::Wire => self.at_most(shape, ShapeKind::Vertex, ShapeKind::Edge, 2),
            ShapeKind::Shell => self.at_most(shape, ShapeKind::Edge, ShapeKind::Face, 2),
            ShapeKind::Solid => self
                .store
                .sub_shapes(shape, ShapeKind::Edge)
                .into_iter()
                .all(|e| self.store.ancestors(e, shape, ShapeKind::Face).len() == 2),
            ShapeKind::CompSolid => self.at_most(shape, ShapeKind::Face, ShapeKind::Solid, 1),
            ShapeKind::Compound => self.cluster_is_manifold(shape)?,
        };
        trace!(%topology, manifold, "manifold check");
        Ok(manifold)
    }

    /// Every `part` of `root` lies in at most `limit` shapes of kind `around`
    /// within `root`.
    fn at_most(&self, root: Shape, part: ShapeKind, around: ShapeKind, limit: usize) -> bool {
        self.store
            .sub_shapes(root, part)
            .into_iter()
            .all(|p| self.store.ancestors(p, root, around).len() <= limit)
    }

    fn vertex_is_manifold(&self, vertex: Shape, host: Shape) -> bool {
        let edges = self.store.ancestors(vertex, host, ShapeKind::Edge);
        let faces = self.store.ancestors(vertex, host, ShapeKind::Face);
        if faces.is_empty() {
            return edges.len() <= 2;
        }

        let mut fan: Vec<Vec<Shape>> = Vec::with_capacity(edges.len());
        for &edge in &edges {
            let around: Vec<Shape> = self.store.ancestors(edge, host, ShapeKind::Face);
            if around.len() > 2 {
                return false;
            }
            fan.push(around);
        }

        // Faces around the vertex must be reachable from each other across
        // the edges at the vertex
        let mut reached: FxHashSet<Shape> = FxHashSet::default();
        let mut stack = vec![faces[0]];
        while let Some(face) = stack.pop() {
            if !reached.insert(face) {
                continue;
            }
            for around in &fan {
                if around.contains(&face) {
                    stack.extend(around.iter().copied().filter(|f| !reached.contains(f)));
                }
            }
        }
        reached.len() == faces.len()
    }

    fn cluster_is_manifold(&self, cluster: Shape) -> Result<bool> {
        let members = self.store.children(cluster);
        let mut used: FxHashSet<Shape> = FxHashSet::default();
        for &member in &members {
            let ty = TopologyType::from_shape_kind(member.kind());
            let own = Topology::new(member, ty, ty.class_guid());
            if !self.is_manifold(own, Some(own))? {
                return Ok(false);
            }
            for vertex in self.store.sub_shapes(member, ShapeKind::Vertex) {
                if !used.insert(vertex) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
